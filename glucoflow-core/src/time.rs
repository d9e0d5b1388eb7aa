//! Time representation for sensor readings
//!
//! The sensor itself only knows its age in minutes; wall-clock timestamps are
//! reconstructed by anchoring that age to the caller-supplied read time.

use crate::constants::time::MS_PER_MINUTE;

/// Timestamp in milliseconds since epoch (or device boot for monotonic clocks)
pub type Timestamp = u64;

/// Subtract `minutes` from a timestamp, saturating at zero.
pub fn minutes_before(ts: Timestamp, minutes: u32) -> Timestamp {
    ts.saturating_sub(minutes as u64 * MS_PER_MINUTE)
}

/// Whole minutes elapsed between two timestamps (0 when `later <= earlier`).
pub fn minutes_between(earlier: Timestamp, later: Timestamp) -> u32 {
    (later.saturating_sub(earlier) / MS_PER_MINUTE) as u32
}
