//! Constants for glucoflow-core
//!
//! Centralized numeric tables used throughout the pipeline. Nothing in the
//! parse path hardcodes a layout offset, field width, or tuning value inline;
//! it all lives here so a new sensor variant is a new table entry, not a code
//! change.
//!
//! ## Organization
//!
//! - **Layout**: per-variant block geometry and bit-field tables
//! - **Glucose**: calibration sentinels, code scaling, clamp range, gating
//! - **Smoothing**: filter iterations, window widths, noise parameters
//! - **Time**: unit conversions and sampling cadences

/// Per-variant block geometry, segment ranges, and bit-field tables.
pub mod layout;

/// Calibration sentinels, code scaling, output clamps, and emission gates.
pub mod glucose;

/// Smoothing filter tuning: iterations, widths, process noise.
pub mod smoothing;

/// Time unit conversions and sampling cadences.
pub mod time;

pub use glucose::{GLUCOSE_MAX_MG_DL, GLUCOSE_MIN_MG_DL, MINIMUM_AGE_MINUTES};
pub use layout::{HISTORY_SLOTS, SLOT_BYTES, TREND_SLOTS};
pub use time::{HISTORY_CADENCE_MINUTES, MS_PER_MINUTE, TREND_CADENCE_MINUTES};
