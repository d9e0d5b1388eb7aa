//! Core decoding and calibration pipeline for wearable glucose sensor telemetry
//!
//! Takes raw, partly encrypted memory blocks read from a glucose sensor patch
//! over BLE or NFC and turns them into calibrated, smoothed, time-ordered
//! glucose readings.
//!
//! Key constraints:
//! - No heap allocation in the parse path (bounded `heapless` collections)
//! - No I/O, no timers, no internal retries - everything is synchronous
//! - All failures surface as typed results, never panics
//!
//! ```no_run
//! use glucoflow_core::{parse_block, SensorIdentity, SensorStore};
//!
//! let identity = SensorIdentity::new([0x3A, 0xE1, 0x00, 0x00, 0x07, 0xA0, 0x10, 0x5D], None);
//! let mut store = SensorStore::new();
//!
//! # let block = [0u8; 344];
//! # let now = 0;
//! match parse_block(&block, 0, &identity, &mut store, now, None) {
//!     Ok(output) => {}, // output.readings, output.state, output.age_minutes
//!     Err(e) => {},     // CRC mismatch, decryption failure, ...
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bitfield;
pub mod calibration;
pub mod cipher;
pub mod constants;
pub mod crc;
pub mod errors;
pub mod identity;
pub mod measurement;
pub mod pipeline;
pub mod ring;
pub mod smoothing;
pub mod state;
pub mod time;
pub mod variant;

// Public API
pub use calibration::{CalibrationParameters, CalibrationStore};
pub use errors::{ParseError, ParseResult};
pub use identity::{SensorIdentity, SensorSerial};
pub use measurement::{GlucoseReading, RawMeasurement};
pub use pipeline::{parse_block, ParseOutput, SensorStore, SmoothingWindow};
pub use state::SensorState;
pub use variant::{SensorKind, SensorVariant};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
