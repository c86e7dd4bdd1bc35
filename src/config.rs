//! Configuration for a PMT readout channel.
//!
//! All parameters live in plain structs with sensible defaults mirroring the
//! reference detector (4 ns ADC tick, 400 ns record, bi-exponential
//! single-photoelectron shape). Configuration is validated once, before any
//! event processing begins; invalid shapes (`risetime == falltime`) are
//! rejected here rather than discovered mid-run.
//!
//! A full configuration can be loaded from a TOML file:
//!
//! ```ignore
//! let config = ReadoutConfig::from_toml_file("channel.toml")?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ReadoutError, Result};

/// System-wide readout channel configuration
///
/// Use `ReadoutConfig::default()` for the reference channel and override
/// fields as needed.
///
/// # Example
/// ```
/// use pmtpulse::config::ReadoutConfig;
///
/// let mut config = ReadoutConfig::default();
/// config.digitizer.baseline_fraction = 0.2;
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadoutConfig {
    /// Single-photoelectron pulse shape and synthesis
    pub pulse: PulseConfig,
    /// ADC conversion parameters
    pub digitizer: DigitizerConfig,
    /// Constant-fraction discrimination parameters
    pub cfd: CfdConfig,
    /// Charge integration window
    pub integration: IntegrationConfig,
    /// Pixel segmentation; `None` for a monolithic sensor
    pub segmentation: Option<SegmentationConfig>,
    /// Include the raw digitized sample sequence in event summaries
    pub record_samples: bool,
}

/// Single-photoelectron response and pulse synthesis configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Kernel rise time constant in ns (must differ from `falltime_ns`)
    pub risetime_ns: f64,
    /// Kernel fall time constant in ns
    pub falltime_ns: f64,
    /// Overall kernel gain (ADC amplitude per unit photon weight)
    pub gain: f64,
    /// Fixed delay between photon arrival and the trace origin, in ns
    pub trace_delay_ns: f64,
    /// Transit-time spread FWHM in ns; 0 disables arrival jitter
    pub transit_spread_fwhm_ns: f64,
    /// Weight photons by the quantum-efficiency curve (requires `qe_table`)
    pub spectral_weighting: bool,
    /// Two-column wavelength/efficiency table file
    pub qe_table: Option<PathBuf>,
}

/// ADC conversion configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigitizerConfig {
    /// Sampling interval in ns
    pub tick_ns: f64,
    /// Record length in ns; the trace holds `window_ns / tick_ns` samples
    pub window_ns: f64,
    /// ADC resolution in bits (sample range before baseline is `2^bits - 1`)
    pub adc_bits: u32,
    /// Baseline offset as a fraction of the full ADC range
    pub baseline_fraction: f64,
    /// Uniform amplitude jitter half-width as a fraction of the ADC range
    pub jitter_fraction: f64,
}

/// Constant-fraction discrimination configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CfdConfig {
    /// Attenuation fraction F applied to the prompt term
    pub fraction: f64,
    /// Delay D of the subtracted term, in ticks
    pub delay_ticks: usize,
    /// Summation length L of the shaping window, in ticks
    pub length_ticks: usize,
}

/// Charge integration window, relative to the fitted maximum
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Ticks before the fitted maximum
    pub pre_ticks: usize,
    /// Ticks after the fitted maximum
    pub post_ticks: usize,
}

/// Pixel segmentation of a position-sensitive sensor
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Number of pixel columns
    pub columns: usize,
    /// Number of pixel rows
    pub rows: usize,
    /// Pixel pitch in mm (active width = `columns * pitch_mm`)
    pub pitch_mm: f64,
    /// Row-major per-pixel gain table file (`columns * rows` values)
    pub gain_table: Option<PathBuf>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            risetime_ns: 4.0,
            falltime_ns: 20.0,
            gain: 1.0e4,
            trace_delay_ns: 50.0,
            transit_spread_fwhm_ns: 0.0,
            spectral_weighting: false,
            qe_table: None,
        }
    }
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            tick_ns: 4.0,
            window_ns: 400.0,
            adc_bits: 14,
            baseline_fraction: 0.1,
            jitter_fraction: 0.0,
        }
    }
}

impl Default for CfdConfig {
    fn default() -> Self {
        Self {
            fraction: 0.5,
            delay_ticks: 2,
            length_ticks: 4,
        }
    }
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            pre_ticks: 5,
            post_ticks: 15,
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            columns: 2,
            rows: 2,
            pitch_mm: 10.0,
            gain_table: None,
        }
    }
}

impl DigitizerConfig {
    /// Trace depth in samples
    pub fn ticks(&self) -> usize {
        if self.tick_ns <= 0.0 {
            return 0;
        }
        (self.window_ns / self.tick_ns).round() as usize
    }

    /// Number of ADC bins (`2^bits`)
    pub fn adc_bins(&self) -> u32 {
        1u32.checked_shl(self.adc_bits).unwrap_or(u32::MAX)
    }
}

impl SegmentationConfig {
    /// Half of the active width/height in mm; positions are measured from the
    /// sensor center
    pub fn half_active_mm(&self) -> (f64, f64) {
        (
            self.columns as f64 * self.pitch_mm / 2.0,
            self.rows as f64 * self.pitch_mm / 2.0,
        )
    }
}

impl ReadoutConfig {
    /// Load and validate a configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: ReadoutConfig = toml::from_str(&text)
            .map_err(|e| ReadoutError::Config(format!("{}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check configuration invariants
    ///
    /// Must pass before any event processing begins; components constructed
    /// from a validated configuration do not fail mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.pulse.risetime_ns <= 0.0 || self.pulse.falltime_ns <= 0.0 {
            return Err(ReadoutError::Config(
                "risetime and falltime must be positive".into(),
            ));
        }
        if self.pulse.risetime_ns == self.pulse.falltime_ns {
            return Err(ReadoutError::SingularPulseShape);
        }
        if self.pulse.transit_spread_fwhm_ns < 0.0 {
            return Err(ReadoutError::Config(
                "transit-time spread must be non-negative".into(),
            ));
        }
        if self.pulse.spectral_weighting && self.pulse.qe_table.is_none() {
            return Err(ReadoutError::Config(
                "spectral weighting enabled but no qe_table given".into(),
            ));
        }
        if self.digitizer.tick_ns <= 0.0 {
            return Err(ReadoutError::Config("ADC tick must be positive".into()));
        }
        if self.digitizer.ticks() == 0 {
            return Err(ReadoutError::Config(
                "trace window must cover at least one tick".into(),
            ));
        }
        if self.digitizer.adc_bits == 0 || self.digitizer.adc_bits > 24 {
            return Err(ReadoutError::Config(
                "ADC resolution must be between 1 and 24 bits".into(),
            ));
        }
        if self.digitizer.baseline_fraction < 0.0 || self.digitizer.jitter_fraction < 0.0 {
            return Err(ReadoutError::Config(
                "baseline and jitter fractions must be non-negative".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.cfd.fraction) || self.cfd.fraction == 0.0 {
            return Err(ReadoutError::Config(
                "CFD fraction must lie in (0, 1)".into(),
            ));
        }
        if self.cfd.delay_ticks == 0 || self.cfd.length_ticks == 0 {
            return Err(ReadoutError::Config(
                "CFD delay and length must be at least one tick".into(),
            ));
        }
        if let Some(ref seg) = self.segmentation {
            if seg.columns == 0 || seg.rows == 0 {
                return Err(ReadoutError::Config(
                    "segmentation requires at least one column and row".into(),
                ));
            }
            if seg.pitch_mm <= 0.0 {
                return Err(ReadoutError::Config("pixel pitch must be positive".into()));
            }
        }
        Ok(())
    }
}
