//! Numeric constants shared across the readout pipeline.
//!
//! These define the out-of-band failure sentinel, clamping limits and epsilon
//! values used to keep the sub-sample fitting routines numerically stable.

/// Out-of-band value returned by algorithms that cannot produce a meaningful
/// result (empty trace, no CFD crossing, degenerate polynomial). Callers must
/// test for it before using a returned time or charge.
pub const SENTINEL: f64 = -9999.0;

/// Epsilon for preventing division by zero in linear interpolation
/// (CFD zero-crossing and threshold-crossing solves).
pub const INTERPOLATION_EPSILON: f64 = 1e-10;

/// Below this magnitude the leading coefficient of a fitted polynomial is
/// treated as zero and the solve falls back to the next lower order.
pub const POLY_COEFF_EPSILON: f64 = 1e-12;

/// Hard ceiling of the digitized sample representation. Samples pushed above
/// this by baseline offset or jitter are clamped here and flag saturation.
pub const ADC_CLAMP_MAX: u32 = 65_535;

/// Minimum number of leading samples used for the baseline estimate when the
/// trace delay covers fewer ticks than this.
pub const MIN_BASELINE_SAMPLES: usize = 15;

/// Fixed 3x3 charge-leakage kernel applied around a hit pixel in segmented
/// mode, indexed as `[dcol + 1][drow + 1]`. Neighbors outside the configured
/// pixel grid are skipped, never wrapped.
pub const ANGER_KERNEL: [[f64; 3]; 3] = [
    [1e-3, 1e-2, 1e-3],
    [1e-2, 1.0, 1e-2],
    [1e-3, 1e-2, 1e-3],
];
