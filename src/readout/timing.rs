use crate::constants::{INTERPOLATION_EPSILON, POLY_COEFF_EPSILON, SENTINEL};
use crate::readout::Digitizer;

/// Constant-fraction discrimination timing over a digitized trace.
///
/// Both algorithms report the phase of the rising edge in ns, with the trace
/// delay already subtracted so the result is comparable to photon arrival
/// times. Flat, inverted or saturated-from-the-start traces have no usable
/// rising edge; both algorithms then return the sentinel, which callers must
/// check before use.
pub struct TimingExtractor {
    tick_ns: f64,
    trace_delay_ns: f64,
}

impl TimingExtractor {
    pub fn new(tick_ns: f64, trace_delay_ns: f64) -> Self {
        Self {
            tick_ns,
            trace_delay_ns,
        }
    }

    /// Traditional constant-fraction discrimination
    ///
    /// Builds the shaped waveform
    /// `cfd[i] = sum_{j<L} F * (s[i-j] - b) - (s[i-j-D] - b)`,
    /// locates its global minimum, walks backward to the last transition from
    /// non-negative to negative and linearly interpolates the zero crossing.
    ///
    /// # Arguments
    /// * `fraction` - attenuation F of the prompt term
    /// * `delay` - delay D of the subtracted term, in ticks
    /// * `length` - summation length L, in ticks
    pub fn analyze_cfd(
        &self,
        digitizer: &mut Digitizer,
        fraction: f64,
        delay: usize,
        length: usize,
    ) -> f64 {
        if digitizer.find_maximum() == SENTINEL {
            return SENTINEL;
        }
        let baseline = digitizer.baseline();
        let samples = digitizer.samples();
        let n = samples.len();

        let first_valid = delay + length - 1;
        if length == 0 || first_valid >= n {
            return SENTINEL;
        }

        let mut cfd = vec![0.0; n];
        for i in first_valid..n {
            let mut acc = 0.0;
            for j in 0..length {
                let prompt = samples[i - j] as f64 - baseline;
                let delayed = samples[i - j - delay] as f64 - baseline;
                acc += fraction * prompt - delayed;
            }
            cfd[i] = acc;
        }

        let mut min_index = first_valid;
        for i in first_valid..n {
            if cfd[i] < cfd[min_index] {
                min_index = i;
            }
        }

        // Last non-negative to negative transition at or before the minimum
        for i in (first_valid + 1..=min_index).rev() {
            if cfd[i] < 0.0 && cfd[i - 1] >= 0.0 {
                let span = cfd[i - 1] - cfd[i];
                let crossing = if span.abs() > INTERPOLATION_EPSILON {
                    (i - 1) as f64 + cfd[i - 1] / span
                } else {
                    (i - 1) as f64
                };
                return crossing * self.tick_ns - self.trace_delay_ns;
            }
        }
        SENTINEL
    }

    /// Polynomial constant-fraction discrimination
    ///
    /// Uses the fitted maximum (computing it if not cached), walks backward
    /// from the peak to the first pair of samples straddling
    /// `F * amplitude + baseline`, fits a quadratic through the three samples
    /// anchored at the lower index and solves it for the threshold crossing.
    /// Falls back to a linear solve when the quadratic term degenerates.
    pub fn analyze_poly_cfd(&self, digitizer: &mut Digitizer, fraction: f64) -> f64 {
        let amplitude = digitizer.find_maximum();
        if amplitude == SENTINEL || amplitude <= 0.0 {
            return SENTINEL;
        }
        let baseline = digitizer.baseline();
        let peak_index = match digitizer.peak() {
            Some(peak) => peak.index,
            None => return SENTINEL,
        };
        let samples = digitizer.samples();
        let n = samples.len();
        let threshold = fraction * amplitude + baseline;

        // Walk back from the peak to the straddling pair (lower, lower + 1)
        let mut lower = None;
        for k in (1..=peak_index).rev() {
            if samples[k] as f64 > threshold && samples[k - 1] as f64 <= threshold {
                lower = Some(k - 1);
                break;
            }
        }
        let Some(lower) = lower else {
            return SENTINEL;
        };

        let crossing = if lower + 2 < n {
            let y0 = samples[lower] as f64;
            let y1 = samples[lower + 1] as f64;
            let y2 = samples[lower + 2] as f64;
            let d2 = y2 - 2.0 * y1 + y0;
            let c2 = d2 / 2.0;
            let c1 = (y1 - y0) - c2;
            solve_rising_crossing(y0 - threshold, c1, c2)
        } else {
            let y0 = samples[lower] as f64;
            let y1 = samples[lower + 1] as f64;
            solve_rising_crossing(y0 - threshold, y1 - y0, 0.0)
        };

        match crossing {
            Some(x) => (lower as f64 + x) * self.tick_ns - self.trace_delay_ns,
            None => SENTINEL,
        }
    }
}

/// Solve `c2 x^2 + c1 x + c0 = 0` for the rising crossing in [0, 1].
///
/// The quadratic is anchored so the threshold straddle lies in the first
/// sample interval; when `c2` degenerates the solve is linear.
fn solve_rising_crossing(c0: f64, c1: f64, c2: f64) -> Option<f64> {
    if c2.abs() < POLY_COEFF_EPSILON {
        if c1 <= INTERPOLATION_EPSILON {
            return None;
        }
        let x = -c0 / c1;
        return (-1e-9..=1.0 + 1e-9).contains(&x).then_some(x.clamp(0.0, 1.0));
    }

    let disc = c1 * c1 - 4.0 * c2 * c0;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let roots = [(-c1 + sqrt_disc) / (2.0 * c2), (-c1 - sqrt_disc) / (2.0 * c2)];
    roots
        .into_iter()
        .filter(|&x| (-1e-9..=1.0 + 1e-9).contains(&x))
        .find(|&x| c1 + 2.0 * c2 * x > 0.0)
        .map(|x| x.clamp(0.0, 1.0))
}
