//! Three-Stage Noise Reduction for Calibrated Readings
//!
//! ## Overview
//!
//! Per-minute readings carry visible quantization and electrochemical
//! jitter. The pipeline runs three stages over a window of calibrated
//! samples, ordered oldest to newest:
//!
//! 1. **Per-minute quadratic regression** - repeated local degree-2
//!    least-squares smoothing over a sliding neighbor window.
//! 2. **Scalar Kalman filter** - identity state transition with equal
//!    process and observation noise, walked oldest to newest.
//! 3. **Per-5-minute quadratic regression** - for each sample, a neighbor
//!    set at 5-minute offsets up to 25 minutes away is smoothed and only
//!    the center value is written back.
//!
//! History samples (15-minute cadence) get only the third stage.
//!
//! ## Divergence guard
//!
//! The Kalman stage stops the moment its predicted state goes nonpositive
//! and leaves the remaining samples raw. A filter that has been dragged
//! below zero by garbage input would otherwise keep polluting every later
//! sample in the window.
//!
//! All stages are in-place and length-preserving. Empty or all-zero input
//! is a no-op, and the per-5-minute stage needs a minimum population before
//! it does anything - young sensors simply pass through.

use heapless::Vec;

use crate::constants::smoothing::{
    FIVE_MINUTE_ITERATIONS, FIVE_MINUTE_MIN_SAMPLES, FIVE_MINUTE_WIDTH, KALMAN_PROCESS_NOISE,
    TREND_ITERATIONS, TREND_WIDTH,
};
use crate::measurement::GlucoseReading;

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

/// Largest per-5-minute neighbor set: the sample plus 5 on each side.
const NEIGHBOR_SET_MAX: usize = 2 * FIVE_MINUTE_WIDTH + 1;

/// Largest window the per-5-minute write-back buffer must hold.
const WINDOW_MAX: usize = 64;

/// Minute stride of the per-5-minute neighbor set.
const NEIGHBOR_STRIDE_MINUTES: u32 = 5;

fn all_zero(samples: &[GlucoseReading]) -> bool {
    samples.iter().all(|s| s.mg_dl == 0.0)
}

/// Least-squares quadratic fit over `(xs, ys)`, evaluated at `x0`.
///
/// Falls back to the plain mean when the points cannot pin down a parabola
/// (fewer than three, or a degenerate design matrix).
fn fit_at(xs: &[f64], ys: &[f64], x0: f64) -> f64 {
    let n = xs.len();
    if n == 0 {
        return 0.0;
    }
    let mean = ys.iter().sum::<f64>() / n as f64;
    if n < 3 {
        return mean;
    }

    // Centering on x0 keeps the normal equations well-conditioned and makes
    // the constant term the fitted value we want.
    let (mut s1, mut s2, mut s3, mut s4) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    let (mut t0, mut t1, mut t2) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let u = x - x0;
        let u2 = u * u;
        s1 += u;
        s2 += u2;
        s3 += u2 * u;
        s4 += u2 * u2;
        t0 += y;
        t1 += u * y;
        t2 += u2 * y;
    }
    let s0 = n as f64;

    let det = s0 * (s2 * s4 - s3 * s3) - s1 * (s1 * s4 - s3 * s2) + s2 * (s1 * s3 - s2 * s2);
    if libm::fabs(det) < 1e-9 {
        log_warn!("quadratic fit degenerate over {} points, using mean", n);
        return mean;
    }
    (t0 * (s2 * s4 - s3 * s3) - s1 * (t1 * s4 - s3 * t2) + s2 * (t1 * s3 - s2 * t2)) / det
}

/// One in-place smoothing pass: each value becomes its local quadratic fit.
fn quadratic_pass(values: &mut [f64], width: usize) {
    let len = values.len();
    for j in 0..len {
        let lo = j.saturating_sub(width);
        let hi = (j + width).min(len - 1);
        let mut xs = [0.0f64; WINDOW_MAX];
        let mut ys = [0.0f64; WINDOW_MAX];
        let count = hi - lo + 1;
        if count > WINDOW_MAX {
            continue;
        }
        for (k, idx) in (lo..=hi).enumerate() {
            xs[k] = idx as f64;
            ys[k] = values[idx];
        }
        values[j] = fit_at(&xs[..count], &ys[..count], j as f64);
    }
}

/// Repeated local quadratic regression over per-minute samples, in place.
pub fn smooth_per_minute(samples: &mut [GlucoseReading], iterations: usize, width: usize) {
    if samples.is_empty() || all_zero(samples) {
        return;
    }
    let len = samples.len().min(WINDOW_MAX);
    let mut values = [0.0f64; WINDOW_MAX];
    for (v, s) in values.iter_mut().zip(samples.iter()) {
        *v = s.mg_dl;
    }
    for _ in 0..iterations {
        quadratic_pass(&mut values[..len], width);
    }
    for (s, v) in samples.iter_mut().zip(values.iter()) {
        s.mg_dl = *v;
    }
}

/// Single-state Kalman filter walked oldest to newest, in place.
///
/// Identity transition with process noise `q`; the observation noise is
/// also `q`. The first sample seeds the state. A nonpositive predicted
/// state stops filtering from that index onward.
pub fn kalman(samples: &mut [GlucoseReading], q: f64) {
    if samples.is_empty() || all_zero(samples) {
        return;
    }
    let mut x = samples[0].mg_dl;
    let mut p = 1.0f64;
    for sample in samples.iter_mut().skip(1) {
        p += q;
        if x <= 0.0 {
            return;
        }
        let gain = p / (p + q);
        x += gain * (sample.mg_dl - x);
        p *= 1.0 - gain;
        sample.mg_dl = x;
    }
}

/// Per-5-minute quadratic smoothing, in place.
///
/// For each sample, neighbors at exactly ±5, ±10, ... minute offsets (up to
/// `width` per side, bounded by the window edges) are collected, smoothed
/// `iterations` times, and only the center value is written back. Below
/// [`FIVE_MINUTE_MIN_SAMPLES`] samples this is a no-op, not an error.
pub fn smooth_per_5_minutes(samples: &mut [GlucoseReading], width: usize, iterations: usize) {
    if samples.len() < FIVE_MINUTE_MIN_SAMPLES || all_zero(samples) {
        return;
    }

    let width = width.min(FIVE_MINUTE_WIDTH);
    let mut updates: Vec<(usize, f64), WINDOW_MAX> = Vec::new();

    for i in 0..samples.len() {
        let center_minute = samples[i].minute;
        let mut xs: Vec<f64, NEIGHBOR_SET_MAX> = Vec::new();
        let mut ys: Vec<f64, NEIGHBOR_SET_MAX> = Vec::new();

        // Left neighbors, oldest first, then the center, then the right side
        for k in (1..=width).rev() {
            let offset = k as u32 * NEIGHBOR_STRIDE_MINUTES;
            if let Some(s) = samples.iter().find(|s| {
                center_minute >= offset && s.minute == center_minute - offset
            }) {
                let _ = xs.push(-(offset as f64));
                let _ = ys.push(s.mg_dl);
            }
        }
        let center_pos = xs.len();
        let _ = xs.push(0.0);
        let _ = ys.push(samples[i].mg_dl);
        for k in 1..=width {
            let offset = k as u32 * NEIGHBOR_STRIDE_MINUTES;
            if let Some(s) = samples.iter().find(|s| s.minute == center_minute + offset) {
                let _ = xs.push(offset as f64);
                let _ = ys.push(s.mg_dl);
            }
        }

        let mut local = [0.0f64; NEIGHBOR_SET_MAX];
        local[..ys.len()].copy_from_slice(&ys);
        for _ in 0..iterations {
            local_pass(&xs, &mut local[..ys.len()]);
        }
        if updates.push((i, local[center_pos])).is_err() {
            break;
        }
    }

    for (i, value) in updates {
        samples[i].mg_dl = value;
    }
}

/// Full-window quadratic pass over an irregular neighbor set.
fn local_pass(xs: &[f64], ys: &mut [f64]) {
    let snapshot: Vec<f64, NEIGHBOR_SET_MAX> = Vec::from_slice(ys).unwrap_or_default();
    for j in 0..ys.len() {
        ys[j] = fit_at(xs, &snapshot, xs[j]);
    }
}

/// The full trend pipeline with default tuning: per-minute regression,
/// Kalman, per-5-minute regression, in that order.
pub fn smooth_trend(samples: &mut [GlucoseReading]) {
    smooth_per_minute(samples, TREND_ITERATIONS, TREND_WIDTH);
    kalman(samples, KALMAN_PROCESS_NOISE);
    smooth_per_5_minutes(samples, FIVE_MINUTE_WIDTH, FIVE_MINUTE_ITERATIONS);
}

/// The history pipeline: per-5-minute style smoothing only.
pub fn smooth_history(samples: &mut [GlucoseReading]) {
    smooth_per_5_minutes(samples, FIVE_MINUTE_WIDTH, FIVE_MINUTE_ITERATIONS);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(minute: u32, mg_dl: f64) -> GlucoseReading {
        GlucoseReading {
            timestamp: minute as u64 * 60_000,
            mg_dl,
            minute,
        }
    }

    #[test]
    fn empty_and_all_zero_are_no_ops() {
        let mut empty: [GlucoseReading; 0] = [];
        smooth_per_minute(&mut empty, 3, 2);
        kalman(&mut empty, 0.5);

        let mut zeros: std::vec::Vec<_> = (0..20).map(|m| reading(m, 0.0)).collect();
        smooth_per_minute(&mut zeros, 3, 2);
        kalman(&mut zeros, 0.5);
        smooth_per_5_minutes(&mut zeros, 5, 2);
        assert!(zeros.iter().all(|s| s.mg_dl == 0.0));
    }

    #[test]
    fn length_is_preserved() {
        let mut samples: std::vec::Vec<_> =
            (0..20).map(|m| reading(m, 100.0 + (m % 3) as f64)).collect();
        let before = samples.len();
        smooth_trend(&mut samples);
        assert_eq!(samples.len(), before);
    }

    #[test]
    fn constant_input_is_a_fixed_point() {
        let mut samples: std::vec::Vec<_> = (0..16).map(|m| reading(m, 120.0)).collect();
        smooth_per_minute(&mut samples, 3, 2);
        for s in &samples {
            assert!((s.mg_dl - 120.0).abs() < 1e-9);
        }
    }

    #[test]
    fn linear_ramp_survives_quadratic_fit() {
        let mut samples: std::vec::Vec<_> =
            (0..16).map(|m| reading(m, 100.0 + 2.0 * m as f64)).collect();
        smooth_per_minute(&mut samples, 2, 2);
        for (m, s) in samples.iter().enumerate() {
            assert!((s.mg_dl - (100.0 + 2.0 * m as f64)).abs() < 1e-6);
        }
    }

    #[test]
    fn quadratic_smoothing_pulls_in_outliers() {
        let mut samples: std::vec::Vec<_> = (0..16).map(|m| reading(m, 100.0)).collect();
        samples[8].mg_dl = 160.0;
        smooth_per_minute(&mut samples, 1, 2);
        assert!(samples[8].mg_dl < 160.0);
        assert!(samples[8].mg_dl > 100.0);
    }

    #[test]
    fn kalman_tracks_and_stays_positive() {
        let mut samples: std::vec::Vec<_> =
            (0..30).map(|m| reading(m, 100.0 + ((m * 7) % 5) as f64)).collect();
        kalman(&mut samples, 0.5);
        assert!(samples.iter().all(|s| s.mg_dl > 0.0));
        // The filter converges toward the signal band
        assert!((samples[29].mg_dl - 102.0).abs() < 3.0);
    }

    #[test]
    fn kalman_stops_after_nonpositive_prediction() {
        let mut samples = [
            reading(0, 10.0),
            reading(1, -50.0),
            reading(2, 30.0),
            reading(3, 40.0),
        ];
        kalman(&mut samples, 0.5);
        // The second update drags the state nonpositive; everything after
        // stays raw
        assert!(samples[1].mg_dl <= 0.0);
        assert_eq!(samples[2].mg_dl, 30.0);
        assert_eq!(samples[3].mg_dl, 40.0);
    }

    #[test]
    fn five_minute_stage_needs_minimum_population() {
        let mut samples: std::vec::Vec<_> =
            (0..10).map(|m| reading(m * 5, 100.0 + m as f64)).collect();
        let before: std::vec::Vec<f64> = samples.iter().map(|s| s.mg_dl).collect();
        smooth_per_5_minutes(&mut samples, 5, 2);
        let after: std::vec::Vec<f64> = samples.iter().map(|s| s.mg_dl).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn five_minute_stage_smooths_spaced_samples() {
        let mut samples: std::vec::Vec<_> = (0..20)
            .map(|m| reading(m * 5, if m == 10 { 160.0 } else { 100.0 }))
            .collect();
        smooth_per_5_minutes(&mut samples, 5, 1);
        assert_eq!(samples.len(), 20);
        assert!(samples[10].mg_dl < 160.0);
    }
}
