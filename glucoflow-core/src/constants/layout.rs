//! Block Geometry and Bit-Field Tables
//!
//! Every byte offset and bit-field position used to pick apart a sensor
//! memory block is defined here, per variant. The decode path is driven
//! entirely by these tables: reading a field means looking up its
//! [`BitField`] descriptor, never computing an offset inline.
//!
//! ## Block anatomy (standard variant)
//!
//! ```text
//! 0        24                                    320      344
//! ├─header─┼──────────────── body ───────────────┼─footer─┤
//!          │ ..status.. trend_ptr history_ptr    │ CRC + calibration codes
//!          │ 28: trend region  (16 slots × 6 B)  │
//!          │ 124: history region (32 slots × 6 B)│
//!          │ 316: age in minutes (u16 LE)        │
//! ```
//!
//! Each segment opens with its own stored CRC16 in the first two bytes.
//! The Pro/H variant uses a different segmentation (see [`PRO_H`]) with the
//! sample regions placed after the checked area.

use crate::bitfield::BitField;

// ===== REGION GEOMETRY =====

/// Slots in the per-minute trend ring.
pub const TREND_SLOTS: usize = 16;

/// Slots in the per-15-minute history ring.
pub const HISTORY_SLOTS: usize = 32;

/// Bytes per measurement slot.
pub const SLOT_BYTES: usize = 6;

/// Bytes in the trend region (16 slots x 6 bytes).
pub const TREND_REGION_BYTES: usize = TREND_SLOTS * SLOT_BYTES;

/// Bytes in the history region (32 slots x 6 bytes).
pub const HISTORY_REGION_BYTES: usize = HISTORY_SLOTS * SLOT_BYTES;

/// Size of the encrypted memory image; also the standard variant block size.
pub const FRAM_BYTES: usize = 344;

/// Largest `min_len` across all variant layouts; sizes the plaintext buffer.
pub const MAX_BLOCK_BYTES: usize = 464;

// ===== DESCRIPTOR TYPES =====

/// Half-open byte range `[start, end)` inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte of the range
    pub start: usize,
    /// One past the last byte of the range
    pub end: usize,
}

impl ByteRange {
    /// Length of the range in bytes.
    pub const fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Bit-field table for one 6-byte measurement slot.
///
/// Offsets are slot-relative. The glucose field is 14 bits wide to cover
/// both 13-bit and 14-bit variants; narrower variants simply never set the
/// top bit.
#[derive(Debug, Clone, Copy)]
pub struct SlotFields {
    /// Raw glucose ADC value
    pub glucose: BitField,
    /// Raw temperature ADC value
    pub temperature: BitField,
    /// Temperature adjustment magnitude (scaled by 4 on decode)
    pub temp_adjustment: BitField,
    /// Sign bit for the temperature adjustment
    pub temp_adjustment_sign: BitField,
}

/// Bit-field table for the footer-resident calibration codes.
///
/// Offsets are footer-relative; the first two footer bytes hold the segment
/// CRC, so codes start at byte 2. Four packed 10-bit codes parameterize the
/// per-sensor provisional response.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationFields {
    /// Base slope code
    pub slope_code: BitField,
    /// Temperature-dependence-of-slope code
    pub slope_temp_code: BitField,
    /// Base offset code
    pub offset_code: BitField,
    /// Temperature-dependence-of-offset code
    pub offset_temp_code: BitField,
}

/// Complete geometry of one sensor variant's memory block.
#[derive(Debug, Clone, Copy)]
pub struct BlockLayout {
    /// CRC-checked segments, indexed by [`crate::crc::Segment`]
    pub segments: [ByteRange; 3],
    /// Offset of the lifecycle status byte
    pub status: usize,
    /// Offset of the sensor age in minutes (u16 LE)
    pub minutes: usize,
    /// Offset of the trend ring write pointer
    pub trend_ptr: usize,
    /// Offset of the history ring write pointer
    pub history_ptr: usize,
    /// First byte of the trend region
    pub trend_base: usize,
    /// First byte of the history region
    pub history_base: usize,
    /// Slot bit-field table
    pub slot: SlotFields,
    /// Footer calibration bit-field table
    pub calibration: CalibrationFields,
    /// Minimum block length for full extraction
    pub min_len: usize,
}

// ===== SLOT FIELD TABLES =====

/// Slot fields shared by all current variants: 14-bit glucose at bit 0,
/// 14-bit temperature at bit 14, 5-bit adjustment at bit 28, sign at bit 33.
const SLOT_FIELDS: SlotFields = SlotFields {
    glucose: BitField { byte: 0, bit: 0, width: 14 },
    temperature: BitField { byte: 1, bit: 6, width: 14 },
    temp_adjustment: BitField { byte: 3, bit: 4, width: 5 },
    temp_adjustment_sign: BitField { byte: 4, bit: 1, width: 1 },
};

/// Four consecutive 10-bit calibration codes starting at footer byte 2.
const CALIBRATION_FIELDS: CalibrationFields = CalibrationFields {
    slope_code: BitField { byte: 2, bit: 0, width: 10 },
    slope_temp_code: BitField { byte: 3, bit: 2, width: 10 },
    offset_code: BitField { byte: 4, bit: 4, width: 10 },
    offset_temp_code: BitField { byte: 5, bit: 6, width: 10 },
};

// ===== VARIANT LAYOUTS =====

/// Standard 344-byte block: 24-byte header, 296-byte body, 24-byte footer.
pub static STANDARD: BlockLayout = BlockLayout {
    segments: [
        ByteRange { start: 0, end: 24 },
        ByteRange { start: 24, end: 320 },
        ByteRange { start: 320, end: 344 },
    ],
    status: 4,
    minutes: 316,
    trend_ptr: 26,
    history_ptr: 27,
    trend_base: 28,
    history_base: 124,
    slot: SLOT_FIELDS,
    calibration: CALIBRATION_FIELDS,
    min_len: FRAM_BYTES,
};

/// Pro/H block: 40-byte header, 32-byte body, 104-byte footer, with the
/// sample regions appended after the CRC-checked area.
pub static PRO_H: BlockLayout = BlockLayout {
    segments: [
        ByteRange { start: 0, end: 40 },
        ByteRange { start: 40, end: 72 },
        ByteRange { start: 72, end: 176 },
    ],
    status: 4,
    minutes: 42,
    trend_ptr: 44,
    history_ptr: 45,
    trend_base: 176,
    history_base: 272,
    slot: SLOT_FIELDS,
    calibration: CALIBRATION_FIELDS,
    min_len: 464,
};
