//! Sensor Lifecycle State
//!
//! The status byte in the block header reports where the sensor is in its
//! life. This is deliberately *not* modeled as a transition-checked state
//! machine: the byte is decoded fresh on every parse and any state may
//! follow any state. The hardware really does jump - a failed sensor can
//! report `Failure` right after `Ready`, and a re-read after an error can
//! land anywhere. Rejecting "impossible" transitions would reject
//! legitimate hardware states.

use crate::constants::glucose::MINIMUM_AGE_MINUTES;

/// Lifecycle state reported by the sensor's status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorState {
    /// Manufactured but never activated
    NotYetStarted,
    /// Activated, still in the warm-up hour
    Starting,
    /// Delivering usable measurements
    Ready,
    /// Past its operational lifetime
    Expired,
    /// Powered down after expiry
    Shutdown,
    /// Hardware or chemistry fault
    Failure,
    /// Status byte outside the known range
    Unknown,
}

impl SensorState {
    /// Decode the raw status byte.
    pub fn from_status_byte(byte: u8) -> Self {
        match byte {
            1 => Self::NotYetStarted,
            2 => Self::Starting,
            3 => Self::Ready,
            4 => Self::Expired,
            5 => Self::Shutdown,
            6 => Self::Failure,
            _ => Self::Unknown,
        }
    }

    /// Whether readings from this state may be emitted at the given sensor
    /// age. Both conditions are checked here and nowhere else - calibration
    /// and smoothing stay gate-free.
    pub fn is_emitting(self, age_minutes: u32) -> bool {
        self == Self::Ready && age_minutes >= MINIMUM_AGE_MINUTES
    }
}
