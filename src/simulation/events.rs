use rand::RngExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, Normal, Poisson};

use crate::channel::PhotonDetectionEvent;

/// Parameters of the synthetic scintillation light source
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct ScintillationConfig {
    /// Mean number of detected photons per event (Poisson distributed)
    pub mean_photons: f64,
    /// Scintillator decay time constant in ns
    pub decay_ns: f64,
    /// Gaussian smearing of individual arrivals in ns
    pub rise_smear_ns: f64,
    /// Emission spectrum peak in nm
    pub emission_peak_nm: f64,
    /// Emission spectrum FWHM in nm
    pub emission_fwhm_nm: f64,
    /// Event vertex on the sensor in mm
    pub vertex_mm: [f64; 3],
    /// Gaussian spread of photon positions around the vertex in mm
    pub vertex_sigma_mm: f64,
    /// Attach positions to generated photons
    pub with_positions: bool,
}

impl Default for ScintillationConfig {
    fn default() -> Self {
        Self {
            mean_photons: 40.0,
            decay_ns: 30.0,
            rise_smear_ns: 1.0,
            emission_peak_nm: 420.0,
            emission_fwhm_nm: 60.0,
            vertex_mm: [0.0, 0.0, 0.0],
            vertex_sigma_mm: 2.0,
            with_positions: false,
        }
    }
}

pub fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

/// Generate the photon batch of one synthetic scintillation event
///
/// Photon count is Poisson distributed; arrival times follow the exponential
/// decay plus a Gaussian smear, clamped to be non-negative; wavelengths are
/// Gaussian around the emission peak; positions (when enabled) are Gaussian
/// around the vertex.
pub fn generate_event<R: RngExt>(
    config: &ScintillationConfig,
    rng: &mut R,
) -> Vec<PhotonDetectionEvent> {
    let count = Poisson::new(config.mean_photons.max(1e-9))
        .map(|p| p.sample(rng) as usize)
        .unwrap_or(0);

    let decay = Exp::new(1.0 / config.decay_ns.max(1e-9)).unwrap();
    let smear = Normal::new(0.0, config.rise_smear_ns.max(0.0)).unwrap();
    let spectrum = Normal::new(
        config.emission_peak_nm,
        (config.emission_fwhm_nm / 2.355).max(0.0),
    )
    .unwrap();
    let scatter = Normal::new(0.0, config.vertex_sigma_mm.max(0.0)).unwrap();

    (0..count)
        .map(|_| {
            let arrival_ns = (decay.sample(rng) + smear.sample(rng)).max(0.0);
            let position_mm = config.with_positions.then(|| {
                [
                    config.vertex_mm[0] + scatter.sample(rng),
                    config.vertex_mm[1] + scatter.sample(rng),
                    config.vertex_mm[2] + scatter.sample(rng),
                ]
            });
            PhotonDetectionEvent {
                arrival_ns,
                wavelength_nm: Some(spectrum.sample(rng)),
                weight: 1.0,
                position_mm,
            }
        })
        .collect()
}
