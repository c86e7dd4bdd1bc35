//! Photon position aggregation and Anger-logic charge sharing.
//!
//! A [`PositionAggregator`] accumulates weighted photon positions into a
//! centroid and tracks detection statistics. For segmented sensors it
//! resolves the hit pixel, spreads the charge across the 3x3 neighborhood
//! with the fixed leakage kernel, and accumulates the four anode currents of
//! the resistive readout.

use std::fs;
use std::path::Path;

use rand::RngExt;

use crate::config::SegmentationConfig;
use crate::constants::ANGER_KERNEL;
use crate::error::{ReadoutError, Result};
use crate::pulse::PulseSynthesizer;

/// Accumulates per-event photon positions, arrival statistics and (for
/// segmented sensors) anode charges.
///
/// Geometry and the per-pixel gain table persist across events; everything
/// else is reset by [`clear`](PositionAggregator::clear).
pub struct PositionAggregator {
    segmentation: Option<SegmentationConfig>,
    gains: Vec<f64>,
    position_sum: [f64; 3],
    total_weight: f64,
    time_sum_ns: f64,
    time_count: u64,
    wavelength_sum_nm: f64,
    wavelength_count: u64,
    min_time_ns: f64,
    detected: u64,
    not_detected: u64,
    anode_charge: [f64; 4],
}

impl PositionAggregator {
    /// Create an aggregator; `None` segmentation selects unsegmented mode
    pub fn new(segmentation: Option<SegmentationConfig>) -> Self {
        let pixels = segmentation
            .as_ref()
            .map(|seg| seg.columns * seg.rows)
            .unwrap_or(0);
        Self {
            segmentation,
            gains: vec![1.0; pixels],
            position_sum: [0.0; 3],
            total_weight: 0.0,
            time_sum_ns: 0.0,
            time_count: 0,
            wavelength_sum_nm: 0.0,
            wavelength_count: 0,
            min_time_ns: f64::INFINITY,
            detected: 0,
            not_detected: 0,
            anode_charge: [0.0; 4],
        }
    }

    /// Install a per-pixel gain table, row-major `columns * rows` values
    pub fn set_gains(&mut self, gains: Vec<f64>) -> Result<()> {
        let expected = self
            .segmentation
            .as_ref()
            .map(|seg| seg.columns * seg.rows)
            .unwrap_or(0);
        if gains.len() != expected {
            return Err(ReadoutError::GainTable(format!(
                "expected {expected} gain values, got {}",
                gains.len()
            )));
        }
        self.gains = gains;
        Ok(())
    }

    /// Load a gain table from a whitespace-separated text file
    pub fn load_gains<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut gains = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            for field in line.split_whitespace() {
                let gain: f64 = field.parse().map_err(|_| ReadoutError::Parse {
                    path: path.display().to_string(),
                    line: lineno + 1,
                    message: format!("invalid gain value `{field}`"),
                })?;
                gains.push(gain);
            }
        }
        self.set_gains(gains)
    }

    /// Add one detected photon
    ///
    /// Always updates the arrival statistics. In unsegmented mode the photon
    /// is accumulated into the centroid and routed into the synthesizer at
    /// its own weight. In segmented mode the photon must resolve to a pixel
    /// inside the configured grid; its charge is then shared across the 3x3
    /// neighborhood (out-of-bounds neighbors skipped, never wrapped) into the
    /// four anode accumulators and the gain-weighted photon is routed into
    /// the synthesizer.
    ///
    /// Returns `true` if the photon contributed, `false` if it was dropped
    /// for lying outside the pixel grid.
    pub fn add_point<R: RngExt>(
        &mut self,
        synthesizer: &mut PulseSynthesizer,
        rng: &mut R,
        wavelength_nm: Option<f64>,
        time_ns: f64,
        position_mm: [f64; 3],
        weight: f64,
    ) -> bool {
        self.record_arrival(time_ns, wavelength_nm);

        let gain = match self.segmentation {
            None => 1.0,
            Some(ref seg) => {
                let seg = seg.clone();
                let Some((col, row)) = resolve_pixel(&seg, position_mm[0], position_mm[1]) else {
                    self.not_detected += 1;
                    return false;
                };
                let gain = self.gains[row * seg.columns + col];
                self.share_charge(&seg, col, row, gain * weight);
                gain
            }
        };

        for (sum, &p) in self.position_sum.iter_mut().zip(&position_mm) {
            *sum += weight * p;
        }
        self.total_weight += weight;
        self.detected += 1;
        synthesizer.add_photon(time_ns, wavelength_nm, gain * weight, rng);
        true
    }

    /// Count a photon that carries no position: arrival statistics and the
    /// detected counter only.
    pub fn add_unpositioned(&mut self, time_ns: f64, wavelength_nm: Option<f64>) {
        self.record_arrival(time_ns, wavelength_nm);
        self.detected += 1;
    }

    fn record_arrival(&mut self, time_ns: f64, wavelength_nm: Option<f64>) {
        self.time_sum_ns += time_ns;
        self.time_count += 1;
        if time_ns < self.min_time_ns {
            self.min_time_ns = time_ns;
        }
        if let Some(wl) = wavelength_nm {
            self.wavelength_sum_nm += wl;
            self.wavelength_count += 1;
        }
    }

    fn share_charge(&mut self, seg: &SegmentationConfig, col: usize, row: usize, charge: f64) {
        for dcol in -1i64..=1 {
            for drow in -1i64..=1 {
                let ncol = col as i64 + dcol;
                let nrow = row as i64 + drow;
                if ncol < 0 || nrow < 0 || ncol >= seg.columns as i64 || nrow >= seg.rows as i64 {
                    continue;
                }
                let leak = ANGER_KERNEL[(dcol + 1) as usize][(drow + 1) as usize];
                let fractions = anode_fractions(seg, ncol as usize, nrow as usize);
                for (anode, fraction) in self.anode_charge.iter_mut().zip(fractions) {
                    *anode += charge * leak * fraction;
                }
            }
        }
    }

    /// Weighted centroid of the accumulated photon positions
    pub fn centroid_mm(&self) -> Option<[f64; 3]> {
        if self.total_weight <= 0.0 {
            return None;
        }
        Some(self.position_sum.map(|s| s / self.total_weight))
    }

    /// Pixel containing the current centroid, or `None` when unsegmented or
    /// out of bounds
    pub fn center_segment(&self) -> Option<(usize, usize)> {
        let seg = self.segmentation.as_ref()?;
        let centroid = self.centroid_mm()?;
        resolve_pixel(seg, centroid[0], centroid[1])
    }

    /// The four accumulated anode charges of the resistive readout
    pub fn anode_charge(&self) -> [f64; 4] {
        self.anode_charge
    }

    /// Fraction of photons that contributed: detected / (detected + dropped)
    pub fn detection_efficiency(&self) -> f64 {
        let total = self.detected + self.not_detected;
        if total == 0 {
            return 0.0;
        }
        self.detected as f64 / total as f64
    }

    pub fn detected(&self) -> u64 {
        self.detected
    }

    pub fn not_detected(&self) -> u64 {
        self.not_detected
    }

    /// Monotonic running minimum arrival time over the event
    pub fn min_time_ns(&self) -> Option<f64> {
        self.min_time_ns.is_finite().then_some(self.min_time_ns)
    }

    /// Simple per-photon mean arrival time
    pub fn mean_time_ns(&self) -> Option<f64> {
        (self.time_count > 0).then(|| self.time_sum_ns / self.time_count as f64)
    }

    /// Simple per-photon mean wavelength over photons that carried one
    pub fn mean_wavelength_nm(&self) -> Option<f64> {
        (self.wavelength_count > 0).then(|| self.wavelength_sum_nm / self.wavelength_count as f64)
    }

    pub fn is_segmented(&self) -> bool {
        self.segmentation.is_some()
    }

    /// Reset all running sums, counters and anode charges. Geometry and the
    /// gain table persist.
    pub fn clear(&mut self) {
        self.position_sum = [0.0; 3];
        self.total_weight = 0.0;
        self.time_sum_ns = 0.0;
        self.time_count = 0;
        self.wavelength_sum_nm = 0.0;
        self.wavelength_count = 0;
        self.min_time_ns = f64::INFINITY;
        self.detected = 0;
        self.not_detected = 0;
        self.anode_charge = [0.0; 4];
    }
}

/// Map a position to its pixel: `floor((p + half_active) / pitch)`, rejecting
/// positions outside the grid.
fn resolve_pixel(seg: &SegmentationConfig, x_mm: f64, y_mm: f64) -> Option<(usize, usize)> {
    let (half_x, half_y) = seg.half_active_mm();
    let col = ((x_mm + half_x) / seg.pitch_mm).floor();
    let row = ((y_mm + half_y) / seg.pitch_mm).floor();
    if col < 0.0 || row < 0.0 || col >= seg.columns as f64 || row >= seg.rows as f64 {
        return None;
    }
    Some((col as usize, row as usize))
}

/// Resistive-divider split of one pixel's charge onto the four anodes, from
/// the pixel center's fractional grid position.
fn anode_fractions(seg: &SegmentationConfig, col: usize, row: usize) -> [f64; 4] {
    let u = (col as f64 + 0.5) / seg.columns as f64;
    let v = (row as f64 + 0.5) / seg.rows as f64;
    [
        (1.0 - u) * (1.0 - v),
        u * (1.0 - v),
        (1.0 - u) * v,
        u * v,
    ]
}
