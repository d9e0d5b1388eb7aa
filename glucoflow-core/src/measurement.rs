//! Measurement Types and Slot Decoding
//!
//! One ring slot is 6 packed bytes. Decoding goes through the variant's
//! bit-field table, so the same code handles every generation's packing.

use crate::constants::layout::SlotFields;
use crate::time::Timestamp;

/// One raw sample extracted from a ring slot.
///
/// Produced by ring extraction, consumed by calibration. Values are ADC
/// units, not clinical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawMeasurement {
    /// Raw glucose ADC value (13-14 bits)
    pub raw_glucose: u16,
    /// Raw temperature ADC value (14 bits)
    pub raw_temperature: u16,
    /// Signed temperature adjustment, already scaled to ADC units
    pub temperature_adjustment: i16,
    /// Wall-clock timestamp reconstructed from the read time
    pub timestamp: Timestamp,
    /// Sensor-relative minute the sample was committed
    pub minute: u32,
}

/// One calibrated reading ready for emission.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlucoseReading {
    /// Wall-clock timestamp of the sample
    pub timestamp: Timestamp,
    /// Calibrated concentration in mg/dL
    pub mg_dl: f64,
    /// Sensor-relative minute the sample was committed
    pub minute: u32,
}

/// Scale factor applied to the packed temperature adjustment magnitude.
const ADJUSTMENT_SCALE: i16 = 4;

/// Decode one 6-byte slot through the variant's field table.
///
/// Returns `None` for an unwritten slot (zero raw glucose) - a young sensor
/// has not filled its rings yet.
pub fn decode_slot(
    slot: &[u8],
    fields: &SlotFields,
    timestamp: Timestamp,
    minute: u32,
) -> Option<RawMeasurement> {
    let raw_glucose = fields.glucose.read(slot) as u16;
    if raw_glucose == 0 {
        return None;
    }

    let raw_temperature = fields.temperature.read(slot) as u16;
    let magnitude = (fields.temp_adjustment.read(slot) as i16) * ADJUSTMENT_SCALE;
    let temperature_adjustment = if fields.temp_adjustment_sign.read(slot) != 0 {
        -magnitude
    } else {
        magnitude
    };

    Some(RawMeasurement {
        raw_glucose,
        raw_temperature,
        temperature_adjustment,
        timestamp,
        minute,
    })
}
