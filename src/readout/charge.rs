use crate::constants::SENTINEL;
use crate::readout::Digitizer;

/// Trapezoidal-rule charge integration over a window of the digitized trace.
///
/// Windows are either absolute sample indices or relative to the fitted
/// maximum. The integral is baseline subtracted; a window shorter than two
/// sample intervals yields the sentinel.
pub struct ChargeIntegrator {
    pre_ticks: usize,
    post_ticks: usize,
}

impl ChargeIntegrator {
    /// Create an integrator with the default maximum-relative window
    ///
    /// # Arguments
    /// * `pre_ticks` - ticks before the fitted maximum
    /// * `post_ticks` - ticks after the fitted maximum
    pub fn new(pre_ticks: usize, post_ticks: usize) -> Self {
        Self {
            pre_ticks,
            post_ticks,
        }
    }

    /// Integrate over the half-open window `(start, stop]`
    ///
    /// Sums `0.5 * (s[i-1] + s[i]) - baseline` per interval. `stop` is
    /// clamped to the last sample; the window must still satisfy
    /// `stop > start + 1` or the sentinel is returned.
    pub fn integrate_pulse(&self, digitizer: &mut Digitizer, start: usize, stop: usize) -> f64 {
        if digitizer.find_maximum() == SENTINEL {
            return SENTINEL;
        }
        let baseline = digitizer.baseline();
        let samples = digitizer.samples();
        if samples.is_empty() {
            return SENTINEL;
        }

        let stop = stop.min(samples.len() - 1);
        if stop <= start + 1 {
            return SENTINEL;
        }

        let mut charge = 0.0;
        for i in start + 1..=stop {
            charge += 0.5 * (samples[i - 1] as f64 + samples[i] as f64) - baseline;
        }
        charge
    }

    /// Integrate the configured window around the fitted maximum
    ///
    /// Equivalent to `integrate_pulse(max(peak - pre, 0), peak + post)`;
    /// requires the peak fit to succeed.
    pub fn integrate_from_maximum(&self, digitizer: &mut Digitizer) -> f64 {
        if digitizer.find_maximum() == SENTINEL {
            return SENTINEL;
        }
        let peak_index = match digitizer.peak() {
            Some(peak) => peak.index,
            None => return SENTINEL,
        };
        let start = peak_index.saturating_sub(self.pre_ticks);
        let stop = peak_index + self.post_ticks;
        self.integrate_pulse(digitizer, start, stop)
    }
}
