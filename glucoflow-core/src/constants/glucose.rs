//! Glucose Calibration and Emission Constants
//!
//! Sentinel raw values, code scaling factors, output clamps, and the
//! lifecycle gate that together fix the numeric behavior of the calibration
//! model. Values here are part of the wire contract with the sensor: change
//! them and previously recorded blocks decode differently.

// ===== OUTPUT RANGE =====

/// Lowest reportable glucose concentration (mg/dL).
///
/// Readings below this are clinically indistinguishable from sensor floor
/// noise and are clamped up to it.
pub const GLUCOSE_MIN_MG_DL: f64 = 39.0;

/// Highest reportable glucose concentration (mg/dL).
pub const GLUCOSE_MAX_MG_DL: f64 = 501.0;

// ===== CALIBRATION CORNER SENTINELS =====
//
// The bilinear model is derived from four synthetic corner points: two raw
// glucose levels crossed with two raw temperature levels. The sentinels are
// fixed raw ADC values; the response at each corner comes from the
// footer-encoded provisional linear model.

/// Lower raw-glucose corner sentinel (ADC units).
pub const RAW_GLUCOSE_LOWER: f64 = 1000.0;

/// Upper raw-glucose corner sentinel (ADC units).
pub const RAW_GLUCOSE_UPPER: f64 = 3000.0;

/// Lower raw-temperature corner sentinel (ADC units).
pub const RAW_TEMPERATURE_LOWER: f64 = 6000.0;

/// Upper raw-temperature corner sentinel (ADC units).
pub const RAW_TEMPERATURE_UPPER: f64 = 9000.0;

// ===== CALIBRATION CODE SCALING =====
//
// The footer packs four 10-bit codes (0..1024). Codes map to the provisional
// response coefficients linearly; the *_MID constants center the signed codes
// on their half-range.

/// Half-range midpoint of a 10-bit calibration code.
pub const CALIBRATION_CODE_MID: f64 = 512.0;

/// Base slope at the lower temperature corner, per slope-code unit.
pub const SLOPE_CODE_BASE: f64 = 0.05;

/// Slope increment per slope-code unit (mg/dL per ADC unit).
pub const SLOPE_CODE_STEP: f64 = 1.0e-4;

/// Slope change across the temperature span, per slope-temp-code unit.
pub const SLOPE_TEMP_CODE_STEP: f64 = 2.0e-5;

/// Base offset at the lower temperature corner (mg/dL).
pub const OFFSET_CODE_BASE: f64 = -20.0;

/// Offset increment per offset-code unit (mg/dL).
pub const OFFSET_CODE_STEP: f64 = 0.05;

/// Offset change across the temperature span, per offset-temp-code unit.
pub const OFFSET_TEMP_CODE_STEP: f64 = 0.01;

// ===== EMISSION GATING =====

/// Minimum sensor age before readings are emitted (minutes).
///
/// During the first hour the sensor chemistry is still equilibrating and
/// values are unreliable regardless of what the status byte claims.
pub const MINIMUM_AGE_MINUTES: u32 = 60;

/// Window inside which a new reading duplicates an already-emitted one
/// (minutes). Duplicates are dropped except the newest.
pub const DEDUP_WINDOW_MINUTES: u32 = 5;
