//! Smoothing Filter Tuning
//!
//! Defaults for the three-stage noise reduction applied to calibrated
//! readings. The pipeline uses these unless the caller overrides them.

/// Passes of local quadratic regression over per-minute samples.
pub const TREND_ITERATIONS: usize = 3;

/// Neighbors on each side in the per-minute regression window.
pub const TREND_WIDTH: usize = 2;

/// Process (and observation) noise of the scalar Kalman stage.
///
/// The filter deliberately uses the same value for Q and R: per-minute
/// readings carry about as much jitter as the underlying signal drifts,
/// which puts the steady-state gain near one half.
pub const KALMAN_PROCESS_NOISE: f64 = 0.5;

/// Passes of quadratic regression in the per-5-minute stage.
pub const FIVE_MINUTE_ITERATIONS: usize = 2;

/// Neighbors on each side in the per-5-minute stage, at 5-minute steps.
pub const FIVE_MINUTE_WIDTH: usize = 5;

/// Minimum samples before the per-5-minute stage does anything.
///
/// Below this the neighbor sets are too sparse to fit; the stage is a no-op,
/// not an error.
pub const FIVE_MINUTE_MIN_SAMPLES: usize = 16;
