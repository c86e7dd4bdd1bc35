//! Per-channel composition of the readout pipeline.
//!
//! A [`ReadoutChannel`] is owned exclusively by one worker thread and
//! processes whole events sequentially: photons are delivered through
//! [`add_photon`](ReadoutChannel::add_photon) in any order, then
//! [`process`](ReadoutChannel::process) runs digitization, peak fitting,
//! CFD timing and charge integration, producing an [`EventSummary`] ready to
//! commit to the shared output sink.

use log::{debug, warn};
use rand::RngExt;
use serde::Serialize;

use crate::config::ReadoutConfig;
use crate::constants::SENTINEL;
use crate::error::Result;
use crate::position::PositionAggregator;
use crate::pulse::PulseSynthesizer;
use crate::readout::{ChargeIntegrator, Digitizer, TimingExtractor};
use crate::spectral::QuantumEfficiencyCurve;

/// One detected photon, as delivered by the transport collaborator.
///
/// Never retained beyond the current event. Delivery order is irrelevant:
/// results are invariant under permutation up to floating-point summation
/// order.
#[derive(Debug, Clone, Copy)]
pub struct PhotonDetectionEvent {
    /// Arrival time relative to the event origin, in ns
    pub arrival_ns: f64,
    /// Wavelength in nm, if known
    pub wavelength_nm: Option<f64>,
    /// Statistical weight
    pub weight: f64,
    /// Position on the sensor in mm, if known
    pub position_mm: Option<[f64; 3]>,
}

impl PhotonDetectionEvent {
    /// A unit-weight photon with no wavelength or position
    pub fn at(arrival_ns: f64) -> Self {
        Self {
            arrival_ns,
            wavelength_nm: None,
            weight: 1.0,
            position_mm: None,
        }
    }
}

/// Per-event results exposed to the output collaborator.
///
/// Values that could not be computed hold the −9999 sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    /// Baseline estimate in ADC counts
    pub baseline: f64,
    /// Fitted baseline-subtracted peak amplitude in ADC counts
    pub peak_amplitude: f64,
    /// Fitted peak time in ns from the trace origin
    pub peak_time_ns: f64,
    /// Traditional CFD phase in ns
    pub cfd_ns: f64,
    /// Polynomial CFD phase in ns
    pub poly_cfd_ns: f64,
    /// Integrated charge over the configured window
    pub charge: f64,
    /// Minimum photon arrival time in ns
    pub min_arrival_ns: f64,
    /// Mean photon arrival time in ns
    pub mean_arrival_ns: f64,
    /// Mean photon wavelength in nm
    pub mean_wavelength_nm: f64,
    /// Detected / (detected + dropped)
    pub detection_efficiency: f64,
    /// Number of photons delivered to the channel
    pub photon_count: usize,
    /// Weighted photon-position centroid in mm
    pub centroid_mm: Option<[f64; 3]>,
    /// Pixel containing the centroid (segmented sensors)
    pub segment: Option<(usize, usize)>,
    /// The four anode charges (segmented sensors)
    pub anode_charge: Option<[f64; 4]>,
    /// True when any ADC sample was clamped
    pub saturated: bool,
    /// Raw digitized samples, when `record_samples` is set
    pub samples: Option<Vec<u32>>,
}

/// The per-PMT-half readout channel: synthesis, digitization, timing, charge
/// and position aggregation in one strictly sequential per-event pipeline.
pub struct ReadoutChannel {
    synthesizer: PulseSynthesizer,
    digitizer: Digitizer,
    timing: TimingExtractor,
    integrator: ChargeIntegrator,
    aggregator: PositionAggregator,
    config: ReadoutConfig,
}

impl ReadoutChannel {
    /// Build a channel from a validated configuration, loading the
    /// quantum-efficiency and pixel-gain tables it names.
    pub fn new(config: &ReadoutConfig) -> Result<Self> {
        config.validate()?;

        let qe = match (config.pulse.spectral_weighting, &config.pulse.qe_table) {
            (true, Some(path)) => Some(QuantumEfficiencyCurve::from_file(path)?),
            _ => None,
        };
        Self::with_qe_curve(config, qe)
    }

    /// Build a channel with an explicit quantum-efficiency curve (or none),
    /// bypassing table loading.
    pub fn with_qe_curve(
        config: &ReadoutConfig,
        qe: Option<QuantumEfficiencyCurve>,
    ) -> Result<Self> {
        config.validate()?;

        let synthesizer = PulseSynthesizer::new(&config.pulse, &config.digitizer, qe)?;
        let digitizer = Digitizer::new(&config.digitizer, config.pulse.trace_delay_ns);
        let timing = TimingExtractor::new(config.digitizer.tick_ns, config.pulse.trace_delay_ns);
        let integrator =
            ChargeIntegrator::new(config.integration.pre_ticks, config.integration.post_ticks);
        let mut aggregator = PositionAggregator::new(config.segmentation.clone());
        if let Some(ref seg) = config.segmentation {
            if let Some(ref path) = seg.gain_table {
                aggregator.load_gains(path)?;
            }
        }

        Ok(Self {
            synthesizer,
            digitizer,
            timing,
            integrator,
            aggregator,
            config: config.clone(),
        })
    }

    /// Deliver one photon to the channel
    ///
    /// Positioned photons go through the aggregator (and, when segmented,
    /// Anger charge sharing); photons without a position feed the pulse
    /// directly. Returns `true` when the photon contributed to the trace.
    pub fn add_photon<R: RngExt>(&mut self, photon: &PhotonDetectionEvent, rng: &mut R) -> bool {
        match photon.position_mm {
            Some(position) => self.aggregator.add_point(
                &mut self.synthesizer,
                rng,
                photon.wavelength_nm,
                photon.arrival_ns,
                position,
                photon.weight,
            ),
            None => {
                self.aggregator
                    .add_unpositioned(photon.arrival_ns, photon.wavelength_nm);
                self.synthesizer.add_photon(
                    photon.arrival_ns,
                    photon.wavelength_nm,
                    photon.weight,
                    rng,
                );
                true
            }
        }
    }

    /// Digitize the accumulated trace and extract timing and charge
    ///
    /// Idempotent within an event (the digitizer refuses to re-digitize);
    /// call [`clear`](ReadoutChannel::clear) before the next event.
    pub fn process<R: RngExt>(&mut self, rng: &mut R) -> EventSummary {
        self.digitizer.digitize(
            self.synthesizer.trace(),
            self.config.digitizer.baseline_fraction,
            self.config.digitizer.jitter_fraction,
            rng,
        );

        let peak_amplitude = self.digitizer.find_maximum();
        let peak_time_ns = self
            .digitizer
            .peak()
            .map(|p| p.time_ns)
            .unwrap_or(SENTINEL);
        let cfd_ns = self.timing.analyze_cfd(
            &mut self.digitizer,
            self.config.cfd.fraction,
            self.config.cfd.delay_ticks,
            self.config.cfd.length_ticks,
        );
        let poly_cfd_ns = self
            .timing
            .analyze_poly_cfd(&mut self.digitizer, self.config.cfd.fraction);
        let charge = self.integrator.integrate_from_maximum(&mut self.digitizer);

        if self.digitizer.saturated() {
            warn!("ADC saturation in event ({} photons)", self.synthesizer.photon_count());
        }
        debug!(
            "event processed: amplitude={peak_amplitude:.1} cfd={cfd_ns:.2} poly_cfd={poly_cfd_ns:.2} charge={charge:.1}"
        );

        EventSummary {
            baseline: self.digitizer.baseline(),
            peak_amplitude,
            peak_time_ns,
            cfd_ns,
            poly_cfd_ns,
            charge,
            min_arrival_ns: self.aggregator.min_time_ns().unwrap_or(SENTINEL),
            mean_arrival_ns: self.aggregator.mean_time_ns().unwrap_or(SENTINEL),
            mean_wavelength_nm: self.aggregator.mean_wavelength_nm().unwrap_or(SENTINEL),
            detection_efficiency: self.aggregator.detection_efficiency(),
            photon_count: self.synthesizer.photon_count(),
            centroid_mm: self.aggregator.centroid_mm(),
            segment: self.aggregator.center_segment(),
            anode_charge: self
                .aggregator
                .is_segmented()
                .then(|| self.aggregator.anode_charge()),
            saturated: self.digitizer.saturated(),
            samples: self
                .config
                .record_samples
                .then(|| self.digitizer.samples().to_vec()),
        }
    }

    /// Reset all per-event state for the next event
    pub fn clear(&mut self) {
        self.synthesizer.clear();
        self.digitizer.clear();
        self.aggregator.clear();
    }

    pub fn synthesizer(&self) -> &PulseSynthesizer {
        &self.synthesizer
    }

    pub fn digitizer(&self) -> &Digitizer {
        &self.digitizer
    }

    pub fn aggregator(&self) -> &PositionAggregator {
        &self.aggregator
    }
}
