//! Ring-Buffer Sample Extraction
//!
//! ## Overview
//!
//! The sensor keeps its samples in two independently rotating regions inside
//! the block body:
//!
//! - **trend**: 16 slots of 6 bytes, one committed per minute (~16 minutes)
//! - **history**: 32 slots of 6 bytes, one per 15 minutes (several hours)
//!
//! Each region has a write pointer naming the *next* slot to be overwritten,
//! so the newest sample sits one behind it and extraction walks backward:
//!
//! ```text
//! slot(i) = (pointer - 1 - i) mod N        i = 0 is the newest sample
//!
//! pointer = 5, N = 16:
//! ┌──┬──┬──┬──┬──┬──┬──┬─ ─ ─┬──┐
//! │12│11│10│ 9│newest│15│14│ ... │13│      walk: 4,3,2,1,0,15,14,...
//! └──┴──┴──┴──┴──┴──┴──┴─ ─ ─┴──┘
//! ```
//!
//! The backward-walk arithmetic is easy to get wrong near zero, so a single
//! tested [`wrap`] helper serves both regions.
//!
//! ## History timestamps
//!
//! Trend timestamps are simple: newest = the current sensor minute, one
//! minute per step back. History slots land on 15-minute buckets, and the
//! sensor commits the ring pointer and the minute counter separately - near
//! a bucket boundary one may lead the other. The extraction compares the
//! bucket implied by the pointer with the bucket implied by the counter and
//! picks the current or previous boundary accordingly. Keep the comparison
//! exactly as written: simplifications reintroduce a slow timestamp drift
//! that only shows up across boundary reads.

use heapless::Vec;

use crate::constants::layout::{
    BlockLayout, HISTORY_REGION_BYTES, HISTORY_SLOTS, SLOT_BYTES, TREND_REGION_BYTES, TREND_SLOTS,
};
use crate::constants::time::HISTORY_CADENCE_MINUTES;
use crate::errors::{ParseError, ParseResult};
use crate::measurement::{decode_slot, RawMeasurement};
use crate::time::{minutes_before, Timestamp};

/// Slot index `back` steps behind `pointer` in a ring of `len` slots.
///
/// Always lands in `0..len`, for any pointer byte the hardware reports.
pub fn wrap(pointer: usize, back: usize, len: usize) -> usize {
    debug_assert!(len > 0);
    ((pointer % len) + len - 1 - (back % len)) % len
}

/// Extract trend samples newest-first.
///
/// `minutes` is the sensor age from the block; the newest trend sample is
/// the current minute and each step back is one minute older. Stops at the
/// first sample older than `cutoff` (the caller's already-seen horizon) or
/// older than the sensor itself.
pub fn extract_trend(
    block: &[u8],
    layout: &BlockLayout,
    read_time: Timestamp,
    minutes: u32,
    cutoff: Option<Timestamp>,
) -> ParseResult<Vec<RawMeasurement, TREND_SLOTS>> {
    let required = layout.trend_base + TREND_REGION_BYTES;
    if block.len() < required {
        return Err(ParseError::InsufficientData {
            required,
            available: block.len(),
        });
    }

    let pointer = block[layout.trend_ptr] as usize;
    let mut samples = Vec::new();
    for i in 0..TREND_SLOTS {
        let age_back = i as u32;
        if age_back > minutes {
            break;
        }
        let timestamp = minutes_before(read_time, age_back);
        if cutoff.is_some_and(|c| timestamp < c) {
            break;
        }
        let slot = wrap(pointer, i, TREND_SLOTS);
        let offset = layout.trend_base + slot * SLOT_BYTES;
        if let Some(m) = decode_slot(
            &block[offset..offset + SLOT_BYTES],
            &layout.slot,
            timestamp,
            minutes - age_back,
        ) {
            // Capacity equals the slot count
            let _ = samples.push(m);
        }
    }
    Ok(samples)
}

/// Extract history samples newest-first.
///
/// The newest sample's minute is the current or the previous 15-minute
/// boundary, disambiguated by comparing the counter-implied bucket with the
/// pointer-implied bucket (see module docs).
pub fn extract_history(
    block: &[u8],
    layout: &BlockLayout,
    read_time: Timestamp,
    minutes: u32,
    cutoff: Option<Timestamp>,
) -> ParseResult<Vec<RawMeasurement, HISTORY_SLOTS>> {
    let required = layout.history_base + HISTORY_REGION_BYTES;
    if block.len() < required {
        return Err(ParseError::InsufficientData {
            required,
            available: block.len(),
        });
    }

    let pointer = block[layout.history_ptr] as usize;
    let aligned = minutes - minutes % HISTORY_CADENCE_MINUTES;
    let counter_bucket = (minutes / HISTORY_CADENCE_MINUTES) % HISTORY_SLOTS as u32;
    let pointer_bucket = (pointer % HISTORY_SLOTS) as u32;
    let newest_minute = if counter_bucket == pointer_bucket {
        aligned
    } else {
        aligned.saturating_sub(HISTORY_CADENCE_MINUTES)
    };

    let mut samples = Vec::new();
    for i in 0..HISTORY_SLOTS {
        let back = i as u32 * HISTORY_CADENCE_MINUTES;
        if back > newest_minute {
            break;
        }
        let minute = newest_minute - back;
        let timestamp = minutes_before(read_time, minutes - minute);
        if cutoff.is_some_and(|c| timestamp < c) {
            break;
        }
        let slot = wrap(pointer, i, HISTORY_SLOTS);
        let offset = layout.history_base + slot * SLOT_BYTES;
        if let Some(m) = decode_slot(
            &block[offset..offset + SLOT_BYTES],
            &layout.slot,
            timestamp,
            minute,
        ) {
            // Capacity equals the slot count
            let _ = samples.push(m);
        }
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::layout::STANDARD;
    use crate::constants::time::MS_PER_MINUTE;

    fn block_with_trend(pointer: u8, glucose_for_slot: impl Fn(usize) -> u16) -> [u8; 344] {
        let mut block = [0u8; 344];
        block[STANDARD.trend_ptr] = pointer;
        for slot in 0..TREND_SLOTS {
            let offset = STANDARD.trend_base + slot * SLOT_BYTES;
            STANDARD
                .slot
                .glucose
                .write(&mut block[offset..offset + SLOT_BYTES], glucose_for_slot(slot) as u32);
            STANDARD
                .slot
                .temperature
                .write(&mut block[offset..offset + SLOT_BYTES], 7000);
        }
        block
    }

    #[test]
    fn wrap_stays_in_bounds_for_every_pointer() {
        for len in [TREND_SLOTS, HISTORY_SLOTS] {
            for pointer in 0..len {
                for back in 0..len {
                    assert!(wrap(pointer, back, len) < len);
                }
            }
        }
    }

    #[test]
    fn wrap_handles_pointer_zero() {
        assert_eq!(wrap(0, 0, 16), 15);
        assert_eq!(wrap(0, 1, 16), 14);
        assert_eq!(wrap(1, 0, 16), 0);
        assert_eq!(wrap(5, 4, 16), 0);
        assert_eq!(wrap(5, 5, 16), 15);
    }

    #[test]
    fn wrap_tolerates_out_of_range_pointer_bytes() {
        // A corrupt pointer byte must still index inside the region
        assert!(wrap(200, 3, 16) < 16);
        assert!(wrap(255, 31, 32) < 32);
    }

    #[test]
    fn trend_walks_newest_first() {
        // Slot s holds glucose 100 + s; pointer 5 means newest is slot 4
        let block = block_with_trend(5, |s| 100 + s as u16);
        let read_time = 1_000_000;
        let samples = extract_trend(&block, &STANDARD, read_time, 500, None).unwrap();
        assert_eq!(samples.len(), TREND_SLOTS);
        assert_eq!(samples[0].raw_glucose, 104);
        assert_eq!(samples[1].raw_glucose, 103);
        assert_eq!(samples[5].raw_glucose, 115); // wrapped to slot 15
        assert_eq!(samples[0].timestamp, read_time);
        assert_eq!(samples[1].timestamp, read_time - MS_PER_MINUTE);
        assert_eq!(samples[0].minute, 500);
        assert_eq!(samples[15].minute, 485);
    }

    #[test]
    fn trend_pointer_zero_wraps_to_last_slot() {
        let block = block_with_trend(0, |s| 100 + s as u16);
        let samples = extract_trend(&block, &STANDARD, 1_000_000, 500, None).unwrap();
        assert_eq!(samples[0].raw_glucose, 115);
    }

    #[test]
    fn trend_stops_at_cutoff() {
        let block = block_with_trend(5, |_| 150);
        let read_time = 1_000_000;
        // Cutoff 3 minutes back: samples at -0, -1, -2, -3 minutes survive
        let cutoff = read_time - 3 * MS_PER_MINUTE;
        let samples = extract_trend(&block, &STANDARD, read_time, 500, Some(cutoff)).unwrap();
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn trend_never_predates_the_sensor() {
        let block = block_with_trend(5, |_| 150);
        let samples = extract_trend(&block, &STANDARD, 1_000_000, 2, None).unwrap();
        assert_eq!(samples.len(), 3); // minutes 2, 1, 0
    }

    #[test]
    fn short_block_fails_closed() {
        let block = [0u8; 100];
        assert!(matches!(
            extract_trend(&block, &STANDARD, 0, 0, None),
            Err(ParseError::InsufficientData { .. })
        ));
        assert!(matches!(
            extract_history(&block, &STANDARD, 0, 0, None),
            Err(ParseError::InsufficientData { .. })
        ));
    }

    fn block_with_history(pointer: u8, minutes: u16) -> [u8; 344] {
        let mut block = [0u8; 344];
        block[STANDARD.history_ptr] = pointer;
        block[STANDARD.minutes] = (minutes & 0xFF) as u8;
        block[STANDARD.minutes + 1] = (minutes >> 8) as u8;
        for slot in 0..HISTORY_SLOTS {
            let offset = STANDARD.history_base + slot * SLOT_BYTES;
            STANDARD
                .slot
                .glucose
                .write(&mut block[offset..offset + SLOT_BYTES], 2000 + slot as u32);
        }
        block
    }

    #[test]
    fn history_bucket_matches_counter() {
        // minutes = 4000: 266 buckets elapsed, 266 % 32 = 10. A pointer of
        // 10 agrees with the counter, so the newest sample sits on the
        // current boundary (3990).
        let block = block_with_history(10, 4000);
        let samples = extract_history(&block, &STANDARD, 10_000_000, 4000, None).unwrap();
        assert_eq!(samples[0].minute, 3990);
        assert_eq!(samples[1].minute, 3975);
        // newest is one behind the pointer
        assert_eq!(samples[0].raw_glucose, 2009);
    }

    #[test]
    fn history_bucket_lags_counter() {
        // Same counter, pointer still at 9: the counter ticked into a bucket
        // the ring has not committed yet, so the newest sample belongs to
        // the previous boundary (3975).
        let block = block_with_history(9, 4000);
        let samples = extract_history(&block, &STANDARD, 10_000_000, 4000, None).unwrap();
        assert_eq!(samples[0].minute, 3975);
    }

    #[test]
    fn history_timestamps_anchor_to_read_time() {
        let read_time = 10_000_000;
        let block = block_with_history(10, 4000);
        let samples = extract_history(&block, &STANDARD, read_time, 4000, None).unwrap();
        // Newest sample is 10 minutes behind the current sensor minute
        assert_eq!(samples[0].timestamp, read_time - 10 * MS_PER_MINUTE);
        assert_eq!(
            samples[1].timestamp,
            read_time - 25 * MS_PER_MINUTE
        );
    }
}
