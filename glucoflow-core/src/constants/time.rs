//! Time-Related Constants
//!
//! Unit conversions and the two sampling cadences of the sensor's ring
//! buffers.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: u32 = 60;

/// Minutes per hour.
pub const MINUTES_PER_HOUR: u32 = 60;

/// Hours per day.
pub const HOURS_PER_DAY: u32 = 24;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: u64 = MS_PER_SECOND * SECONDS_PER_MINUTE as u64;

/// Minutes per day.
pub const MINUTES_PER_DAY: u32 = MINUTES_PER_HOUR * HOURS_PER_DAY;

// ===== SAMPLING CADENCES =====

/// Trend ring cadence: the sensor commits one trend slot per minute.
pub const TREND_CADENCE_MINUTES: u32 = 1;

/// History ring cadence: one history slot per 15 minutes.
pub const HISTORY_CADENCE_MINUTES: u32 = 15;
