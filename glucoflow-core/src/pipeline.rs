//! Parse Orchestration
//!
//! ## Overview
//!
//! This module wires the leaf components into the full decode path:
//!
//! ```text
//! raw block ──► variant registry ──► decrypt (if needed) ──► CRC check
//!                                                               │
//!     lifecycle gate ◄── smoothing ◄── calibration ◄── ring extraction
//!          │
//!          ▼
//!     deduplicated, time-ordered readings
//! ```
//!
//! ## Per-sensor state
//!
//! Everything the pipeline remembers between parses lives in a
//! [`SensorStore`] owned by the caller: cached calibration parameters, the
//! smoothing continuity window that bridges read gaps, and the emission
//! horizon used for deduplication. One store per physical sensor - two
//! sensors decoded in the same process cannot contaminate each other, and
//! a serial change resets the store wholesale.
//!
//! The caller must serialize parses per physical sensor. The store is
//! mutated once per successful parse and read at the start of the next;
//! there is no interior locking.
//!
//! ## Emission rules
//!
//! Readings are emitted oldest to newest, only while the lifecycle gate is
//! open (state `Ready` and at least an hour of sensor age). A candidate
//! within five minutes of the previously emitted sample is dropped - except
//! the newest of the batch, which always represents the current value.

use heapless::Vec;

use crate::calibration::{self, CalibrationParameters, CalibrationStore};
use crate::constants::glucose::DEDUP_WINDOW_MINUTES;
use crate::constants::layout::MAX_BLOCK_BYTES;
use crate::constants::time::MS_PER_MINUTE;
use crate::crc;
use crate::errors::{ParseError, ParseResult};
use crate::identity::{SensorIdentity, SensorSerial};
use crate::measurement::GlucoseReading;
use crate::ring;
use crate::smoothing;
use crate::state::SensorState;
use crate::time::Timestamp;
use crate::variant;

/// Samples kept in the continuity window between parses.
const WINDOW_CAPACITY: usize = 32;

/// Upper bound on readings one parse can emit (full history + full trend).
const OUTPUT_CAPACITY: usize = 48;

/// Bound on pre-thinning emission candidates: window bridge material plus
/// both rings.
const CANDIDATE_CAPACITY: usize = 80;

/// Sliding buffer of recent calibrated samples, persisted by the caller
/// across parses to bridge read gaps (BLE reads only deliver the last few
/// minutes; the window supplies the context the smoothers need).
#[derive(Debug, Default, Clone)]
pub struct SmoothingWindow {
    samples: Vec<GlucoseReading, WINDOW_CAPACITY>,
}

impl SmoothingWindow {
    /// Empty window.
    pub const fn new() -> Self {
        Self { samples: Vec::new() }
    }

    /// Samples currently held, in no particular order.
    pub fn samples(&self) -> &[GlucoseReading] {
        &self.samples
    }

    /// Fold freshly smoothed samples in, replacing same-minute entries and
    /// evicting the oldest when full.
    pub fn absorb(&mut self, fresh: &[GlucoseReading]) {
        for sample in fresh {
            if let Some(existing) = self
                .samples
                .iter_mut()
                .find(|e| e.minute == sample.minute)
            {
                *existing = *sample;
                continue;
            }
            if self.samples.is_full() {
                let mut oldest = 0;
                for (i, e) in self.samples.iter().enumerate() {
                    if e.minute < self.samples[oldest].minute {
                        oldest = i;
                    }
                }
                self.samples.swap_remove(oldest);
            }
            // Capacity was just ensured
            let _ = self.samples.push(*sample);
        }
    }

    /// Drop everything (serial change).
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// All per-sensor state the pipeline keeps between parses.
#[derive(Debug, Default, Clone)]
pub struct SensorStore {
    serial: Option<SensorSerial>,
    calibration: CalibrationStore,
    window: SmoothingWindow,
    last_emitted: Option<Timestamp>,
}

impl SensorStore {
    /// Fresh store for a newly discovered sensor.
    pub const fn new() -> Self {
        Self {
            serial: None,
            calibration: CalibrationStore::new(),
            window: SmoothingWindow::new(),
            last_emitted: None,
        }
    }

    /// Supply externally fetched calibration parameters (e.g. from the
    /// calibration oracle). Parameters bound to another serial are ignored
    /// at lookup time.
    pub fn supply_calibration(&mut self, params: CalibrationParameters) {
        self.calibration.insert(params);
    }

    /// The continuity window, for callers that persist it across sessions.
    pub fn window(&self) -> &SmoothingWindow {
        &self.window
    }

    /// Timestamp of the newest reading emitted so far.
    pub fn last_emitted(&self) -> Option<Timestamp> {
        self.last_emitted
    }

    fn bind(&mut self, serial: SensorSerial) {
        if self.serial != Some(serial) {
            if self.serial.is_some() {
                self.calibration = CalibrationStore::new();
                self.window.clear();
                self.last_emitted = None;
            }
            self.serial = Some(serial);
        }
        self.calibration.invalidate_unless(serial);
    }
}

/// Everything one successful parse produces.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    /// Calibrated readings, oldest to newest, deduplicated against the
    /// store's emission horizon. Empty while the lifecycle gate is closed.
    pub readings: Vec<GlucoseReading, OUTPUT_CAPACITY>,
    /// Lifecycle state decoded from this block
    pub state: SensorState,
    /// Sensor age in minutes from this block
    pub age_minutes: u32,
    /// The decrypted, CRC-validated block for downstream consumers
    pub plaintext: Vec<u8, MAX_BLOCK_BYTES>,
}

/// Decode one raw block into calibrated readings.
///
/// `header_offset` is the length of any fixed transport header in front of
/// the memory image. `cutoff` is the caller's already-seen horizon:
/// extraction stops at the first sample older than it.
pub fn parse_block(
    raw: &[u8],
    header_offset: usize,
    identity: &SensorIdentity,
    store: &mut SensorStore,
    read_time: Timestamp,
    cutoff: Option<Timestamp>,
) -> ParseResult<ParseOutput> {
    let variant = variant::resolve(identity.patch_info())?;
    let layout = variant.layout;
    let serial = identity.serial();
    store.bind(serial);

    let mut plaintext: Vec<u8, MAX_BLOCK_BYTES> = Vec::new();
    variant::decrypt_if_needed(variant, raw, header_offset, identity, &mut plaintext)?;

    crc::check_block(&plaintext, 0, layout)
        .map_err(|segment| ParseError::CrcMismatch { segment })?;

    let state = SensorState::from_status_byte(plaintext[layout.status]);
    let age_minutes =
        u16::from_le_bytes([plaintext[layout.minutes], plaintext[layout.minutes + 1]]) as u32;

    let trend_raw = ring::extract_trend(&plaintext, layout, read_time, age_minutes, cutoff)?;
    let history_raw = ring::extract_history(&plaintext, layout, read_time, age_minutes, cutoff)?;

    let params = match store.calibration.get(serial) {
        Some(cached) => *cached,
        None if variant.local_calibration => {
            let derived = calibration::derive_parameters(&plaintext, layout, serial)?;
            if !derived.valid {
                return Err(ParseError::CalibrationMissing);
            }
            store.calibration.insert(derived);
            derived
        }
        // Variants without footer calibration need remotely supplied
        // parameters; nothing may be fabricated downstream.
        None => return Err(ParseError::CalibrationMissing),
    };

    // Calibrate, flip newest-first extraction order to oldest-first, and
    // bridge the trend with the continuity window before smoothing.
    let mut trend: Vec<GlucoseReading, OUTPUT_CAPACITY> = Vec::new();
    let oldest_trend_minute = trend_raw.last().map(|m| m.minute);
    if let Some(oldest) = oldest_trend_minute {
        for held in store.window.samples() {
            if held.minute < oldest {
                let _ = trend.push(*held);
            }
        }
    }
    for m in trend_raw.iter().rev() {
        let _ = trend.push(GlucoseReading {
            timestamp: m.timestamp,
            mg_dl: calibration::apply(m, &params),
            minute: m.minute,
        });
    }
    trend.sort_unstable_by_key(|s| s.minute);
    smoothing::smooth_trend(&mut trend);

    let mut history: Vec<GlucoseReading, OUTPUT_CAPACITY> = Vec::new();
    for m in history_raw.iter().rev() {
        let _ = history.push(GlucoseReading {
            timestamp: m.timestamp,
            mg_dl: calibration::apply(m, &params),
            minute: m.minute,
        });
    }
    smoothing::smooth_history(&mut history);

    store.window.absorb(&trend);

    let mut output = ParseOutput {
        readings: Vec::new(),
        state,
        age_minutes,
        plaintext,
    };

    if !state.is_emitting(age_minutes) {
        return Ok(output);
    }

    // Merge both streams oldest-first and thin against the emission horizon.
    // Already-emitted samples (window bridge material) drop out up front so
    // they cannot crowd out fresh ones.
    let mut candidates: Vec<GlucoseReading, CANDIDATE_CAPACITY> = Vec::new();
    for s in history.iter().chain(trend.iter()) {
        if store.last_emitted.map_or(true, |l| s.timestamp > l) {
            let _ = candidates.push(*s);
        }
    }
    candidates.sort_unstable_by_key(|s| s.timestamp);

    let newest = candidates.last().map(|s| s.timestamp);
    let dedup_ms = DEDUP_WINDOW_MINUTES as u64 * MS_PER_MINUTE;
    let mut last = store.last_emitted;
    for c in candidates.iter() {
        let strictly_newer = last.map_or(true, |l| c.timestamp > l);
        if !strictly_newer {
            continue;
        }
        let outside_window = last.map_or(true, |l| c.timestamp >= l + dedup_ms);
        let is_newest = Some(c.timestamp) == newest;
        if outside_window || is_newest {
            let _ = output.readings.push(*c);
            last = Some(c.timestamp);
        }
    }
    store.last_emitted = last;

    Ok(output)
}
