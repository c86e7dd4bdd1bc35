use rand::RngExt;

use crate::config::{DigitizerConfig, PulseConfig};
use crate::error::Result;
use crate::pulse::SinglePhotonResponse;
use crate::spectral::QuantumEfficiencyCurve;

/// Superposes weighted single-photoelectron kernels into one continuous
/// analog trace for one channel, for one event.
///
/// The trace buffer is sized once at construction and reused across events
/// via [`clear`](PulseSynthesizer::clear); adding a photon costs
/// O(trace length) with no allocation. Photons whose contribution window
/// falls entirely past the end of the trace contribute nothing.
pub struct PulseSynthesizer {
    response: SinglePhotonResponse,
    qe: Option<QuantumEfficiencyCurve>,
    tick_ns: f64,
    trace_delay_ns: f64,
    transit_spread_fwhm_ns: f64,
    trace: Vec<f64>,
    arrivals_ns: Vec<f64>,
    weights: Vec<f64>,
    min_arrival_ns: f64,
}

impl PulseSynthesizer {
    /// Create a synthesizer for one readout channel
    ///
    /// `qe` enables spectral weighting; with `None` every photon is accepted
    /// at full efficiency.
    pub fn new(
        pulse: &PulseConfig,
        digitizer: &DigitizerConfig,
        qe: Option<QuantumEfficiencyCurve>,
    ) -> Result<Self> {
        let response =
            SinglePhotonResponse::new(pulse.risetime_ns, pulse.falltime_ns, pulse.gain)?;
        Ok(Self {
            response,
            qe,
            tick_ns: digitizer.tick_ns,
            trace_delay_ns: pulse.trace_delay_ns,
            transit_spread_fwhm_ns: pulse.transit_spread_fwhm_ns,
            trace: vec![0.0; digitizer.ticks()],
            arrivals_ns: Vec::new(),
            weights: Vec::new(),
            min_arrival_ns: f64::INFINITY,
        })
    }

    /// Add one detected photon to the analog trace
    ///
    /// The photon's kernel is placed at `arrival + trace delay`, optionally
    /// perturbed by a symmetric uniform transit-time jitter of half-width
    /// FWHM/2 and clamped to the trace origin. The kernel is accumulated from
    /// the first affected sample through the end of the trace; samples are
    /// evaluated at their midpoints.
    ///
    /// # Arguments
    /// * `arrival_ns` - photon arrival time relative to the event origin
    /// * `wavelength_nm` - photon wavelength for spectral weighting, if known
    /// * `weight` - statistical weight of the photon
    /// * `rng` - randomness source for the transit-time jitter
    pub fn add_photon<R: RngExt>(
        &mut self,
        arrival_ns: f64,
        wavelength_nm: Option<f64>,
        weight: f64,
        rng: &mut R,
    ) {
        let efficiency = match (&self.qe, wavelength_nm) {
            (Some(curve), Some(wl)) => curve.eval(wl),
            _ => 1.0,
        };

        if arrival_ns < self.min_arrival_ns {
            self.min_arrival_ns = arrival_ns;
        }
        self.arrivals_ns.push(arrival_ns);
        self.weights.push(weight);

        let mut dt = arrival_ns + self.trace_delay_ns;
        if self.transit_spread_fwhm_ns > 0.0 {
            dt += (rng.random::<f64>() - 0.5) * self.transit_spread_fwhm_ns;
        }
        if dt < 0.0 {
            dt = 0.0;
        }

        let scale = weight * efficiency;
        let first = (dt / self.tick_ns) as usize;
        for k in first..self.trace.len() {
            let t = (k as f64 + 0.5) * self.tick_ns - dt;
            self.trace[k] += scale * self.response.amplitude(t);
        }
    }

    /// The accumulated analog trace, one amplitude per ADC tick
    pub fn trace(&self) -> &[f64] {
        &self.trace
    }

    /// Number of photons added since the last clear
    pub fn photon_count(&self) -> usize {
        self.arrivals_ns.len()
    }

    /// Running minimum photon arrival time over the event
    pub fn min_arrival_ns(&self) -> Option<f64> {
        self.min_arrival_ns.is_finite().then_some(self.min_arrival_ns)
    }

    /// Simple mean of photon arrival times (per photon, not charge weighted)
    pub fn mean_arrival_ns(&self) -> Option<f64> {
        if self.arrivals_ns.is_empty() {
            return None;
        }
        Some(self.arrivals_ns.iter().sum::<f64>() / self.arrivals_ns.len() as f64)
    }

    /// Sum of photon weights added since the last clear
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn response(&self) -> &SinglePhotonResponse {
        &self.response
    }

    pub fn trace_delay_ns(&self) -> f64 {
        self.trace_delay_ns
    }

    /// Reset the trace and photon statistics for the next event. The buffer
    /// keeps its capacity; configuration is untouched.
    pub fn clear(&mut self) {
        self.trace.fill(0.0);
        self.arrivals_ns.clear();
        self.weights.clear();
        self.min_arrival_ns = f64::INFINITY;
    }
}
