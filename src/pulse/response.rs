use crate::error::{ReadoutError, Result};

/// Analytic bi-exponential single-photoelectron pulse kernel
///
/// The response to one detected photon at t = 0 is
///
/// `a(t) = gain * A * (exp(-t / falltime) - exp(-t / risetime))` for t > 0,
///
/// with normalization `A = 1 / (falltime - risetime)`, and zero for t <= 0.
/// The normalization and the kernel's own time of peak are cached and only
/// recomputed when the time constants change; `risetime == falltime` makes
/// the normalization singular and is rejected on construction.
#[derive(Debug, Clone)]
pub struct SinglePhotonResponse {
    risetime_ns: f64,
    falltime_ns: f64,
    gain: f64,
    norm: f64,
    peak_offset_ns: f64,
}

impl SinglePhotonResponse {
    /// Create a kernel with the given time constants and gain
    ///
    /// # Arguments
    /// * `risetime_ns` - rise time constant in ns
    /// * `falltime_ns` - fall time constant in ns, must differ from the rise
    /// * `gain` - overall amplitude scale
    pub fn new(risetime_ns: f64, falltime_ns: f64, gain: f64) -> Result<Self> {
        let mut kernel = Self {
            risetime_ns: 0.0,
            falltime_ns: 0.0,
            gain,
            norm: 0.0,
            peak_offset_ns: 0.0,
        };
        kernel.set_shape(risetime_ns, falltime_ns)?;
        Ok(kernel)
    }

    /// Change the time constants, recomputing the cached normalization and
    /// peak offset
    pub fn set_shape(&mut self, risetime_ns: f64, falltime_ns: f64) -> Result<()> {
        if risetime_ns <= 0.0 || falltime_ns <= 0.0 {
            return Err(ReadoutError::Config(
                "pulse time constants must be positive".into(),
            ));
        }
        if risetime_ns == falltime_ns {
            return Err(ReadoutError::SingularPulseShape);
        }
        self.risetime_ns = risetime_ns;
        self.falltime_ns = falltime_ns;
        self.norm = 1.0 / (falltime_ns - risetime_ns);
        self.peak_offset_ns =
            (risetime_ns / falltime_ns).ln() / (1.0 / falltime_ns - 1.0 / risetime_ns);
        Ok(())
    }

    /// Kernel amplitude at time `t_ns` after photon arrival
    pub fn amplitude(&self, t_ns: f64) -> f64 {
        if t_ns <= 0.0 {
            return 0.0;
        }
        self.gain
            * self.norm
            * ((-t_ns / self.falltime_ns).exp() - (-t_ns / self.risetime_ns).exp())
    }

    /// Time of the kernel's own maximum, in ns after photon arrival
    pub fn peak_offset_ns(&self) -> f64 {
        self.peak_offset_ns
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn risetime_ns(&self) -> f64 {
        self.risetime_ns
    }

    pub fn falltime_ns(&self) -> f64 {
        self.falltime_ns
    }
}
