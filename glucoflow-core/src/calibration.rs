//! Per-Sensor Bilinear Calibration
//!
//! ## Overview
//!
//! Raw glucose counts do not map to concentration on their own: the
//! electrochemical response drifts with skin temperature, and each sensor
//! leaves the factory with its own response coefficients packed into the
//! block footer. Calibration therefore uses a bilinear model over raw
//! glucose `g` and (adjustment-corrected) raw temperature `t`:
//!
//! ```text
//! mg/dL = offset_slope·g + slope_offset·t + slope_slope·t·g + offset_offset
//! ```
//!
//! ## Derivation
//!
//! The four coefficients are solved in closed form from four synthetic
//! corner points - two sentinel raw-glucose levels crossed with two sentinel
//! raw-temperature levels. At each corner the expected response comes from
//! the sensor's provisional linear model (footer codes give a slope and an
//! offset, each with a temperature dependence). Four unknowns, four corner
//! equations on a product grid: the solution is unique and reproduces every
//! corner response exactly, which the tests pin to 1e-6.
//!
//! ```text
//!        t=TL        t=TU
//! g=GL   R00 ──────── R01
//!         │  bilinear  │
//! g=GU   R10 ──────── R11
//! ```
//!
//! ## Caching
//!
//! Parameters are derived once per sensor (or supplied remotely) and cached
//! by serial in a [`CalibrationStore`] owned by the caller, one store per
//! active sensor. The store refuses to hand out parameters bound to a
//! different serial; the pipeline clears it when the serial changes.

use crate::constants::glucose::{
    CALIBRATION_CODE_MID, GLUCOSE_MAX_MG_DL, GLUCOSE_MIN_MG_DL, OFFSET_CODE_BASE,
    OFFSET_CODE_STEP, OFFSET_TEMP_CODE_STEP, RAW_GLUCOSE_LOWER, RAW_GLUCOSE_UPPER,
    RAW_TEMPERATURE_LOWER, RAW_TEMPERATURE_UPPER, SLOPE_CODE_BASE, SLOPE_CODE_STEP,
    SLOPE_TEMP_CODE_STEP,
};
use crate::constants::layout::BlockLayout;
use crate::crc::validate_segment;
use crate::errors::{ParseError, ParseResult};
use crate::identity::SensorSerial;
use crate::measurement::RawMeasurement;

/// Coefficients of the bilinear raw-to-concentration transform, bound to
/// one sensor serial.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationParameters {
    /// Coefficient on the `t·g` cross term
    pub slope_slope: f64,
    /// Coefficient on raw temperature
    pub slope_offset: f64,
    /// Coefficient on raw glucose
    pub offset_slope: f64,
    /// Constant term
    pub offset_offset: f64,
    /// Serial the parameters were derived for
    pub serial: SensorSerial,
    /// Whether the footer validity tag checked out at derivation time
    pub valid: bool,
}

/// Derive calibration parameters from a validated plaintext block.
///
/// Reads the four 10-bit footer codes through the variant's field table,
/// builds the provisional response at each corner, and solves the bilinear
/// system. The footer's own CRC doubles as the validity tag binding the
/// parameters to this block's sensor.
pub fn derive_parameters(
    block: &[u8],
    layout: &BlockLayout,
    serial: SensorSerial,
) -> ParseResult<CalibrationParameters> {
    let footer = &layout.segments[2];
    if block.len() < footer.end {
        return Err(ParseError::InsufficientData {
            required: footer.end,
            available: block.len(),
        });
    }
    let footer_bytes = &block[footer.start..footer.end];

    let fields = &layout.calibration;
    let slope_code = fields.slope_code.read(footer_bytes) as f64;
    let slope_temp_code = fields.slope_temp_code.read(footer_bytes) as f64;
    let offset_code = fields.offset_code.read(footer_bytes) as f64;
    let offset_temp_code = fields.offset_temp_code.read(footer_bytes) as f64;

    // Provisional linear response: slope and offset at the lower temperature
    // corner plus their change across the temperature span.
    let slope_low = SLOPE_CODE_BASE + slope_code * SLOPE_CODE_STEP;
    let slope_span = (slope_temp_code - CALIBRATION_CODE_MID) * SLOPE_TEMP_CODE_STEP;
    let offset_low = OFFSET_CODE_BASE + (offset_code - CALIBRATION_CODE_MID) * OFFSET_CODE_STEP;
    let offset_span = (offset_temp_code - CALIBRATION_CODE_MID) * OFFSET_TEMP_CODE_STEP;

    let response = |g: f64, t: f64| {
        let frac = (t - RAW_TEMPERATURE_LOWER) / (RAW_TEMPERATURE_UPPER - RAW_TEMPERATURE_LOWER);
        (slope_low + slope_span * frac) * g + (offset_low + offset_span * frac)
    };

    let r00 = response(RAW_GLUCOSE_LOWER, RAW_TEMPERATURE_LOWER);
    let r10 = response(RAW_GLUCOSE_UPPER, RAW_TEMPERATURE_LOWER);
    let r01 = response(RAW_GLUCOSE_LOWER, RAW_TEMPERATURE_UPPER);
    let r11 = response(RAW_GLUCOSE_UPPER, RAW_TEMPERATURE_UPPER);

    let g_span = RAW_GLUCOSE_UPPER - RAW_GLUCOSE_LOWER;
    let t_span = RAW_TEMPERATURE_UPPER - RAW_TEMPERATURE_LOWER;

    let slope_slope = (r11 - r10 - r01 + r00) / (g_span * t_span);
    let offset_slope = (r10 - r00) / g_span - slope_slope * RAW_TEMPERATURE_LOWER;
    let slope_offset = (r01 - r00) / t_span - slope_slope * RAW_GLUCOSE_LOWER;
    let offset_offset = r00
        - offset_slope * RAW_GLUCOSE_LOWER
        - slope_offset * RAW_TEMPERATURE_LOWER
        - slope_slope * RAW_GLUCOSE_LOWER * RAW_TEMPERATURE_LOWER;

    // The footer's stored reverse-form CRC doubles as the validity tag:
    // parameters derived from a footer whose tag does not check out must
    // never be served from the cache.
    let valid = validate_segment(footer_bytes);

    Ok(CalibrationParameters {
        slope_slope,
        slope_offset,
        offset_slope,
        offset_offset,
        serial,
        valid,
    })
}

/// Apply calibration to one raw sample, clamped to the reportable range.
///
/// The temperature adjustment is added to the raw temperature before the
/// bilinear evaluation.
pub fn apply(sample: &RawMeasurement, params: &CalibrationParameters) -> f64 {
    let g = sample.raw_glucose as f64;
    let t = sample.raw_temperature as f64 + sample.temperature_adjustment as f64;
    let value = params.offset_slope * g
        + params.slope_offset * t
        + params.slope_slope * t * g
        + params.offset_offset;
    value.clamp(GLUCOSE_MIN_MG_DL, GLUCOSE_MAX_MG_DL)
}

/// Unclamped evaluation, used by the corner-exactness tests.
#[cfg(test)]
fn evaluate(params: &CalibrationParameters, g: f64, t: f64) -> f64 {
    params.offset_slope * g + params.slope_offset * t + params.slope_slope * t * g
        + params.offset_offset
}

/// Per-sensor calibration cache.
///
/// One store per active sensor, passed by reference into the pipeline, so
/// several sensors can be decoded in one process without cross-talk. The
/// caller serializes parses per physical sensor.
#[derive(Debug, Default, Clone)]
pub struct CalibrationStore {
    cached: Option<CalibrationParameters>,
}

impl CalibrationStore {
    /// Empty store.
    pub const fn new() -> Self {
        Self { cached: None }
    }

    /// Cached parameters for `serial`, if any. Parameters bound to a
    /// different serial are never returned.
    pub fn get(&self, serial: SensorSerial) -> Option<&CalibrationParameters> {
        self.cached.as_ref().filter(|p| p.serial == serial && p.valid)
    }

    /// Cache parameters (local derivation or a remote fetch).
    pub fn insert(&mut self, params: CalibrationParameters) {
        self.cached = Some(params);
    }

    /// Drop any parameters not bound to `serial`.
    pub fn invalidate_unless(&mut self, serial: SensorSerial) {
        if self.cached.is_some_and(|p| p.serial != serial) {
            self.cached = None;
        }
    }

    /// Whether anything is cached.
    pub fn is_empty(&self) -> bool {
        self.cached.is_none()
    }
}
