use rand::RngExt;

use crate::config::DigitizerConfig;
use crate::constants::{ADC_CLAMP_MAX, MIN_BASELINE_SAMPLES, POLY_COEFF_EPSILON, SENTINEL};

/// Result of the sub-sample peak fit over the digitized trace
#[derive(Debug, Clone, Copy)]
pub struct PeakFit {
    /// Index of the raw (unfitted) maximum sample
    pub index: usize,
    /// Baseline-subtracted fitted peak amplitude
    pub amplitude: f64,
    /// Fitted peak time in ns from the trace origin
    pub time_ns: f64,
    /// Cubic coefficients `c0 + c1 x + c2 x^2 + c3 x^3` over the fit window,
    /// with x in samples from `window_start`
    pub coefficients: [f64; 4],
    /// First sample index of the 4-sample fit window
    pub window_start: usize,
}

/// Converts an analog trace into a fixed-depth integer sample sequence with
/// baseline, jitter and saturation handling, and locates the pulse maximum
/// with sub-sample resolution.
///
/// One digitizer is owned by one readout channel; the sample buffer is sized
/// at construction and reused across events. `digitize` is idempotent within
/// an event: once computed, the samples stay fixed until
/// [`clear`](Digitizer::clear).
pub struct Digitizer {
    tick_ns: f64,
    trace_delay_ns: f64,
    adc_bins: u32,
    samples: Vec<u32>,
    baseline: f64,
    saturated: bool,
    digitized: bool,
    peak: Option<PeakFit>,
}

impl Digitizer {
    pub fn new(config: &DigitizerConfig, trace_delay_ns: f64) -> Self {
        Self {
            tick_ns: config.tick_ns,
            trace_delay_ns,
            adc_bins: config.adc_bins(),
            samples: vec![0; config.ticks()],
            baseline: 0.0,
            saturated: false,
            digitized: false,
            peak: None,
        }
    }

    /// Digitize an analog trace
    ///
    /// Each sample becomes `clamp(floor(analog), 0, bins - 1)` plus a
    /// baseline offset of `baseline_fraction * bins` and a uniform jitter in
    /// `±jitter_fraction * bins`. Values the representation cannot express
    /// are clamped (to `bins - 1` before the offset, to 65535 after) and the
    /// sticky event-level saturation flag is raised.
    ///
    /// A no-op if the trace was already digitized for this event.
    pub fn digitize<R: RngExt>(
        &mut self,
        analog: &[f64],
        baseline_fraction: f64,
        jitter_fraction: f64,
        rng: &mut R,
    ) {
        if self.digitized {
            return;
        }

        let bins = self.adc_bins as f64;
        let offset = baseline_fraction * bins;
        let jitter_half_width = jitter_fraction * bins;

        for (sample, &amplitude) in self.samples.iter_mut().zip(analog) {
            let mut raw = amplitude.floor();
            if raw < 0.0 {
                raw = 0.0;
            } else if raw > bins - 1.0 {
                raw = bins - 1.0;
                self.saturated = true;
            }

            let mut value = raw + offset;
            if jitter_half_width > 0.0 {
                value += (rng.random::<f64>() * 2.0 - 1.0) * jitter_half_width;
            }

            let clamped = if value >= ADC_CLAMP_MAX as f64 + 1.0 {
                self.saturated = true;
                ADC_CLAMP_MAX
            } else if value < 0.0 {
                0
            } else {
                value as u32
            };
            *sample = clamped;
        }
        self.digitized = true;
    }

    /// Locate the pulse maximum with sub-sample resolution
    ///
    /// Estimates the baseline from the leading samples (the larger of the
    /// trace-delay span and 15 ticks), scans for the largest
    /// baseline-subtracted sample, and fits a cubic through the four samples
    /// straddling it, favoring whichever side has the steeper neighbor. The
    /// fit is cached for the timing and integration routines.
    ///
    /// Returns the fitted baseline-subtracted amplitude, or the sentinel if
    /// the trace is empty or not yet digitized.
    pub fn find_maximum(&mut self) -> f64 {
        if let Some(ref peak) = self.peak {
            return peak.amplitude;
        }
        if self.samples.is_empty() || !self.digitized {
            return SENTINEL;
        }

        let n_baseline = ((self.trace_delay_ns / self.tick_ns) as usize)
            .max(MIN_BASELINE_SAMPLES)
            .min(self.samples.len());
        self.baseline = self.samples[..n_baseline]
            .iter()
            .map(|&s| s as f64)
            .sum::<f64>()
            / n_baseline as f64;

        let mut max_index = 0;
        let mut max_value = f64::NEG_INFINITY;
        for (k, &s) in self.samples.iter().enumerate() {
            let v = s as f64 - self.baseline;
            if v > max_value {
                max_value = v;
                max_index = k;
            }
        }

        let peak = self.fit_peak(max_index);
        let amplitude = peak.amplitude;
        self.peak = Some(peak);
        amplitude
    }

    /// Fit a cubic through the 4 samples straddling `max_index` and evaluate
    /// its maximum.
    fn fit_peak(&self, max_index: usize) -> PeakFit {
        let n = self.samples.len();
        if n < 4 {
            // Too short for a cubic; report the raw sample
            return PeakFit {
                index: max_index,
                amplitude: self.samples[max_index] as f64 - self.baseline,
                time_ns: max_index as f64 * self.tick_ns,
                coefficients: [self.samples[max_index] as f64, 0.0, 0.0, 0.0],
                window_start: max_index,
            };
        }

        // Window selection: take the extra sample on the side whose neighbor
        // sits higher, i.e. where the true peak most likely falls.
        let left = if max_index > 0 {
            self.samples[max_index - 1] as f64
        } else {
            f64::NEG_INFINITY
        };
        let right = if max_index + 1 < n {
            self.samples[max_index + 1] as f64
        } else {
            f64::NEG_INFINITY
        };
        let start = if right >= left {
            max_index.saturating_sub(1)
        } else {
            max_index.saturating_sub(2)
        }
        .min(n - 4);

        let y: Vec<f64> = self.samples[start..start + 4]
            .iter()
            .map(|&s| s as f64)
            .collect();

        // Newton forward differences give the interpolating cubic in the
        // power basis over x in [0, 3].
        let d1 = y[1] - y[0];
        let d2 = y[2] - 2.0 * y[1] + y[0];
        let d3 = y[3] - 3.0 * y[2] + 3.0 * y[1] - y[0];
        let c0 = y[0];
        let c1 = d1 - d2 / 2.0 + d3 / 3.0;
        let c2 = d2 / 2.0 - d3 / 2.0;
        let c3 = d3 / 6.0;

        let eval = |x: f64| c0 + c1 * x + c2 * x * x + c3 * x * x * x;
        let fallback_x = (max_index - start) as f64;

        // Stationary points of the cubic: 3 c3 x^2 + 2 c2 x + c1 = 0
        let x = if c3.abs() < POLY_COEFF_EPSILON {
            if c2 < -POLY_COEFF_EPSILON {
                (-c1 / (2.0 * c2)).clamp(0.0, 3.0)
            } else {
                fallback_x
            }
        } else {
            let disc = 4.0 * c2 * c2 - 12.0 * c1 * c3;
            if disc < 0.0 {
                fallback_x
            } else {
                let sqrt_disc = disc.sqrt();
                let roots = [
                    (-2.0 * c2 + sqrt_disc) / (6.0 * c3),
                    (-2.0 * c2 - sqrt_disc) / (6.0 * c3),
                ];
                // Keep the in-window root that is a maximum (concave there)
                roots
                    .into_iter()
                    .find(|&r| (0.0..=3.0).contains(&r) && 2.0 * c2 + 6.0 * c3 * r < 0.0)
                    .unwrap_or(fallback_x)
            }
        };

        PeakFit {
            index: max_index,
            amplitude: eval(x) - self.baseline,
            time_ns: (start as f64 + x) * self.tick_ns,
            coefficients: [c0, c1, c2, c3],
            window_start: start,
        }
    }

    /// The clamped integer sample sequence
    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    /// Baseline estimate from the leading samples; valid after
    /// [`find_maximum`](Digitizer::find_maximum)
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// True when any sample of this event required clamping
    pub fn saturated(&self) -> bool {
        self.saturated
    }

    pub fn is_digitized(&self) -> bool {
        self.digitized
    }

    /// Cached result of the last peak fit, if any
    pub fn peak(&self) -> Option<&PeakFit> {
        self.peak.as_ref()
    }

    pub fn tick_ns(&self) -> f64 {
        self.tick_ns
    }

    pub fn trace_delay_ns(&self) -> f64 {
        self.trace_delay_ns
    }

    /// Reset per-event state; the sample buffer keeps its depth
    pub fn clear(&mut self) {
        self.samples.fill(0);
        self.baseline = 0.0;
        self.saturated = false;
        self.digitized = false;
        self.peak = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn digitizer() -> Digitizer {
        Digitizer::new(&DigitizerConfig::default(), 50.0)
    }

    #[test]
    fn test_baseline_law() {
        // All-zero analog trace with baseline fraction b and no jitter gives
        // floor(b * bins) everywhere, without saturating.
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut dig = digitizer();
        dig.digitize(&[0.0; 100], 0.25, 0.0, &mut rng);

        assert!(dig.samples().iter().all(|&s| s == 4096));
        assert!(!dig.saturated());
    }

    #[test]
    fn test_digitize_is_idempotent() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let analog = vec![100.0; 100];
        let mut dig = digitizer();
        dig.digitize(&analog, 0.1, 0.0, &mut rng);
        let first: Vec<u32> = dig.samples().to_vec();

        dig.digitize(&[5000.0; 100], 0.5, 0.1, &mut rng);
        assert_eq!(dig.samples(), &first[..]);

        dig.clear();
        dig.digitize(&[5000.0; 100], 0.0, 0.0, &mut rng);
        assert_eq!(dig.samples()[0], 5000);
    }

    #[test]
    fn test_adc_range_clamp_sets_saturation() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut analog = vec![0.0; 100];
        analog[40] = 1.0e6; // far beyond the 14-bit range
        let mut dig = digitizer();
        dig.digitize(&analog, 0.0, 0.0, &mut rng);

        assert!(dig.saturated());
        assert_eq!(dig.samples()[40], 16383);
    }

    #[test]
    fn test_hard_ceiling_clamp() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let config = DigitizerConfig {
            adc_bits: 16,
            ..DigitizerConfig::default()
        };
        let mut analog = vec![0.0; 100];
        analog[40] = 1.0e6;
        let mut dig = Digitizer::new(&config, 50.0);
        // 65535 + 0.1 * 65536 exceeds the representable ceiling
        dig.digitize(&analog, 0.1, 0.0, &mut rng);

        assert!(dig.saturated());
        assert_eq!(dig.samples()[40], 65535);
        assert!(dig.samples().iter().all(|&s| s <= 65535));
    }

    #[test]
    fn test_jitter_is_bounded_and_deterministic() {
        let analog = vec![1000.0; 100];
        let mut a = digitizer();
        let mut b = digitizer();
        let mut rng_a = ChaCha8Rng::seed_from_u64(99);
        let mut rng_b = ChaCha8Rng::seed_from_u64(99);
        a.digitize(&analog, 0.1, 0.01, &mut rng_a);
        b.digitize(&analog, 0.1, 0.01, &mut rng_b);

        assert_eq!(a.samples(), b.samples());

        let center = 1000.0 + 0.1 * 16384.0;
        let half_width = 0.01 * 16384.0;
        for &s in a.samples() {
            assert!((s as f64 - center).abs() <= half_width + 1.0);
        }
    }

    #[test]
    fn test_find_maximum_before_digitize_is_sentinel() {
        let mut dig = digitizer();
        assert_eq!(dig.find_maximum(), SENTINEL);
    }

    #[test]
    fn test_find_maximum_fits_between_samples() {
        // A symmetric triangle peaking exactly between samples 50 and 51.
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut analog = vec![0.0; 100];
        for (k, v) in analog.iter_mut().enumerate() {
            let d = (k as f64 - 50.5).abs();
            *v = (4000.0 - 800.0 * d).max(0.0);
        }
        let mut dig = digitizer();
        dig.digitize(&analog, 0.1, 0.0, &mut rng);
        let amplitude = dig.find_maximum();

        let peak = dig.peak().unwrap();
        assert!(amplitude > 0.0);
        assert_relative_eq!(peak.time_ns, 50.5 * 4.0, epsilon = 2.0);
        // Cached: a second call returns the same fit
        assert_eq!(dig.find_maximum(), amplitude);
    }

    #[test]
    fn test_baseline_estimate_spans_trace_delay() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut analog = vec![0.0; 100];
        analog[60] = 3000.0;
        let mut dig = digitizer();
        dig.digitize(&analog, 0.2, 0.0, &mut rng);
        dig.find_maximum();

        // 0.2 * 16384 = 3276.8 -> floor = 3276 over the first 15 samples
        assert_relative_eq!(dig.baseline(), 3276.0);
    }
}
