//! Wavelength-dependent quantum efficiency.
//!
//! A [`QuantumEfficiencyCurve`] maps photon wavelength to detection
//! efficiency by linear interpolation over an ordered table, with optional
//! extrapolation functions taking over below and above the table's domain.
//! The table is loaded once and never mutated afterwards.

use std::fs;
use std::path::Path;

use crate::error::{ReadoutError, Result};

/// Extrapolation applied outside the table's wavelength domain
pub type ExtrapolationFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// Ordered (wavelength, efficiency) lookup table
///
/// # Example
/// ```
/// use pmtpulse::spectral::QuantumEfficiencyCurve;
///
/// let qe = QuantumEfficiencyCurve::from_table(
///     vec![300.0, 400.0, 500.0, 600.0],
///     vec![0.05, 0.25, 0.20, 0.05],
/// )
/// .unwrap();
///
/// assert!((qe.eval(450.0) - 0.225).abs() < 1e-12);
/// assert_eq!(qe.eval(200.0), 0.0); // below domain, no extrapolation set
/// ```
pub struct QuantumEfficiencyCurve {
    wavelengths_nm: Vec<f64>,
    efficiencies: Vec<f64>,
    below_domain: Option<ExtrapolationFn>,
    above_domain: Option<ExtrapolationFn>,
}

impl QuantumEfficiencyCurve {
    /// Build a curve from parallel wavelength/efficiency tables
    ///
    /// # Errors
    /// Rejects tables with mismatched lengths, fewer than two points,
    /// non-ascending wavelengths, or efficiencies outside [0, 1].
    pub fn from_table(wavelengths_nm: Vec<f64>, efficiencies: Vec<f64>) -> Result<Self> {
        if wavelengths_nm.len() != efficiencies.len() {
            return Err(ReadoutError::QeTable(
                "wavelength and efficiency columns differ in length".into(),
            ));
        }
        if wavelengths_nm.len() < 2 {
            return Err(ReadoutError::QeTable("need at least two points".into()));
        }
        if wavelengths_nm.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ReadoutError::QeTable(
                "wavelengths must be strictly ascending".into(),
            ));
        }
        if efficiencies.iter().any(|e| !(0.0..=1.0).contains(e)) {
            return Err(ReadoutError::QeTable(
                "efficiencies must lie in [0, 1]".into(),
            ));
        }
        Ok(Self {
            wavelengths_nm,
            efficiencies,
            below_domain: None,
            above_domain: None,
        })
    }

    /// Load a curve from a two-column whitespace-separated text file
    /// (wavelength in nm, efficiency). Blank lines and `#` comments are
    /// skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut wavelengths = Vec::new();
        let mut efficiencies = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let parse = |field: Option<&str>| -> Result<f64> {
                field
                    .ok_or(())
                    .and_then(|f| f.parse::<f64>().map_err(|_| ()))
                    .map_err(|_| ReadoutError::Parse {
                        path: path.display().to_string(),
                        line: lineno + 1,
                        message: "expected `<wavelength_nm> <efficiency>`".into(),
                    })
            };
            wavelengths.push(parse(fields.next())?);
            efficiencies.push(parse(fields.next())?);
        }
        Self::from_table(wavelengths, efficiencies)
    }

    /// Install the extrapolation used below the table's first wavelength
    pub fn with_below_domain(mut self, f: ExtrapolationFn) -> Self {
        self.below_domain = Some(f);
        self
    }

    /// Install the extrapolation used above the table's last wavelength
    pub fn with_above_domain(mut self, f: ExtrapolationFn) -> Self {
        self.above_domain = Some(f);
        self
    }

    /// Detection efficiency at the given wavelength
    ///
    /// Linear interpolation inside the table domain; outside it the matching
    /// extrapolation function is consulted, or 0 if none is installed.
    pub fn eval(&self, wavelength_nm: f64) -> f64 {
        let first = self.wavelengths_nm[0];
        let last = *self.wavelengths_nm.last().unwrap();

        if wavelength_nm < first {
            return self
                .below_domain
                .as_ref()
                .map(|f| f(wavelength_nm))
                .unwrap_or(0.0);
        }
        if wavelength_nm > last {
            return self
                .above_domain
                .as_ref()
                .map(|f| f(wavelength_nm))
                .unwrap_or(0.0);
        }

        let hi = self
            .wavelengths_nm
            .partition_point(|&w| w < wavelength_nm)
            .max(1)
            .min(self.wavelengths_nm.len() - 1);
        let lo = hi - 1;
        let (w0, w1) = (self.wavelengths_nm[lo], self.wavelengths_nm[hi]);
        let t = (wavelength_nm - w0) / (w1 - w0);
        self.efficiencies[lo] * (1.0 - t) + self.efficiencies[hi] * t
    }

    /// Wavelength domain covered by the table, in nm
    pub fn domain_nm(&self) -> (f64, f64) {
        (self.wavelengths_nm[0], *self.wavelengths_nm.last().unwrap())
    }
}

impl std::fmt::Debug for QuantumEfficiencyCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantumEfficiencyCurve")
            .field("points", &self.wavelengths_nm.len())
            .field("domain_nm", &self.domain_nm())
            .field("below_domain", &self.below_domain.is_some())
            .field("above_domain", &self.above_domain.is_some())
            .finish()
    }
}
