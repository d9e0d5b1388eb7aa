//! Sensor Variant Registry
//!
//! The first patch-info byte identifies the hardware/firmware generation of
//! a sensor, and everything downstream depends on it: block geometry, which
//! segments are CRC-checked, whether the memory image is encrypted, and how
//! long the sensor lives. The registry is a static table; adding a variant
//! means adding a row, not touching the decode path.

use heapless::Vec;

use crate::cipher;
use crate::constants::layout::{self, BlockLayout, FRAM_BYTES, MAX_BLOCK_BYTES};
use crate::constants::time::MINUTES_PER_DAY;
use crate::errors::{ParseError, ParseResult};
use crate::identity::SensorIdentity;

/// Hardware/firmware generation of a sensor patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    /// First generation, plaintext memory image
    Gen1,
    /// First generation US firmware, plaintext
    Gen1Us,
    /// Second generation, encrypted memory image
    Gen2,
    /// Second generation US firmware, encrypted with the alternate key pair
    Gen2Us,
    /// Professional/hospital variant, plaintext with its own segmentation
    ProH,
    /// Prefix not present in the registry
    Unknown,
}

/// Static descriptor of one sensor variant.
#[derive(Debug, Clone, Copy)]
pub struct SensorVariant {
    /// Which generation this describes
    pub kind: SensorKind,
    /// Block geometry and bit-field tables
    pub layout: &'static BlockLayout,
    /// Whether the memory image must be decrypted before parsing
    pub requires_decryption: bool,
    /// Whether calibration parameters can be derived from the block footer.
    /// Variants without local calibration need remotely supplied parameters.
    pub local_calibration: bool,
    /// Operational lifetime, if the variant enforces one
    pub max_age_minutes: Option<u32>,
}

const FOURTEEN_DAYS: u32 = 14 * MINUTES_PER_DAY;

static VARIANTS: [SensorVariant; 5] = [
    SensorVariant {
        kind: SensorKind::Gen1,
        layout: &layout::STANDARD,
        requires_decryption: false,
        local_calibration: true,
        max_age_minutes: Some(FOURTEEN_DAYS),
    },
    SensorVariant {
        kind: SensorKind::Gen1Us,
        layout: &layout::STANDARD,
        requires_decryption: false,
        local_calibration: true,
        max_age_minutes: Some(FOURTEEN_DAYS),
    },
    SensorVariant {
        kind: SensorKind::Gen2,
        layout: &layout::STANDARD,
        requires_decryption: true,
        local_calibration: true,
        max_age_minutes: Some(FOURTEEN_DAYS),
    },
    SensorVariant {
        kind: SensorKind::Gen2Us,
        layout: &layout::STANDARD,
        requires_decryption: true,
        local_calibration: true,
        max_age_minutes: Some(FOURTEEN_DAYS),
    },
    SensorVariant {
        kind: SensorKind::ProH,
        layout: &layout::PRO_H,
        requires_decryption: false,
        local_calibration: false,
        max_age_minutes: None,
    },
];

/// Patch-info prefix to generation mapping.
static PREFIXES: [(u8, SensorKind); 7] = [
    (0xDF, SensorKind::Gen1),
    (0xA2, SensorKind::Gen1),
    (0xE5, SensorKind::Gen1Us),
    (0x9D, SensorKind::Gen2),
    (0xC5, SensorKind::Gen2),
    (0x76, SensorKind::Gen2Us),
    (0x70, SensorKind::ProH),
];

/// Classify a patch-info sequence into a sensor generation.
///
/// Absent or empty patch info defaults to the oldest plaintext generation -
/// sensors that predate patch-info reporting are all [`SensorKind::Gen1`].
pub fn classify(patch_info: &[u8]) -> SensorKind {
    let Some(&prefix) = patch_info.first() else {
        return SensorKind::Gen1;
    };
    PREFIXES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, kind)| *kind)
        .unwrap_or(SensorKind::Unknown)
}

/// Look up the descriptor for a generation. `Unknown` has none.
pub fn variant_for(kind: SensorKind) -> Option<&'static SensorVariant> {
    VARIANTS.iter().find(|v| v.kind == kind)
}

/// Resolve a patch-info sequence straight to a descriptor, surfacing
/// [`ParseError::UnsupportedVariant`] for unknown prefixes.
pub fn resolve(patch_info: &[u8]) -> ParseResult<&'static SensorVariant> {
    let kind = classify(patch_info);
    variant_for(kind).ok_or(ParseError::UnsupportedVariant {
        prefix: patch_info.first().copied().unwrap_or(0),
    })
}

/// Operational lifetime of a generation in days, if it enforces one.
pub fn max_age_days(kind: SensorKind) -> Option<u32> {
    variant_for(kind)?.max_age_minutes.map(|m| m / MINUTES_PER_DAY)
}

/// Copy the variant's block image past the transport header into `plain`,
/// decrypting it when the variant needs that.
///
/// Returns `Ok(true)` when decryption ran, `Ok(false)` for plaintext
/// variants (straight copy). The block must hold `min_len` bytes past the
/// header; anything shorter fails closed before a single byte is read.
pub fn decrypt_if_needed(
    variant: &SensorVariant,
    block: &[u8],
    header_offset: usize,
    identity: &SensorIdentity,
    plain: &mut Vec<u8, MAX_BLOCK_BYTES>,
) -> ParseResult<bool> {
    let required = header_offset + variant.layout.min_len;
    if block.len() < required {
        return Err(ParseError::InsufficientData {
            required,
            available: block.len(),
        });
    }

    plain.clear();
    // Capacity is MAX_BLOCK_BYTES and min_len never exceeds it
    let _ = plain.extend_from_slice(&block[header_offset..required]);
    if !variant.requires_decryption {
        return Ok(false);
    }

    let image = cipher::decrypt_fram(identity.uid(), identity.patch_info(), &plain[..FRAM_BYTES])?;
    plain[..FRAM_BYTES].copy_from_slice(&image);
    Ok(true)
}
