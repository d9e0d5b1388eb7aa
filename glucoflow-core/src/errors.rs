//! Error Types for the Decoding Pipeline
//!
//! ## Design Philosophy
//!
//! The error system follows a few rules suited to a hot parse path that may
//! run on constrained devices:
//!
//! 1. **Small Size**: Each variant carries only a few machine words, so a
//!    `Result` return costs no more than a status code.
//!
//! 2. **No Heap Allocation**: All error data is inline - no `String`, only
//!    plain fields. Deterministic memory usage on every path.
//!
//! 3. **Copy Semantics**: Errors implement `Copy` for cheap propagation with
//!    `?` and storage in caller-side queues.
//!
//! 4. **Taxonomy over Detail**: The caller's recovery choices differ by error
//!    *class*, not by byte offset. A CRC mismatch discards the whole parse; a
//!    decryption failure signals key-material mismatch rather than transport
//!    corruption; an unsupported variant is a retry-or-give-up decision for
//!    the transport layer.
//!
//! None of these errors are recovered internally. The core never logs them,
//! never retries, and never touches a UI - they propagate as typed results
//! and the transport/application layer decides what to do.

use thiserror_no_std::Error;

use crate::crc::Segment;

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors surfaced by the decoding pipeline - kept small and `Copy`
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Block or payload shorter than the variant requires. Fails closed:
    /// nothing was read past the end, no partial result is produced.
    #[error("Insufficient data: need {required} bytes, have {available}")]
    InsufficientData {
        /// Minimum byte count the operation needed
        required: usize,
        /// Byte count actually supplied
        available: usize,
    },

    /// Stored CRC16 of a segment does not match the computed one.
    /// The entire parse is discarded - no guessed correction.
    #[error("CRC mismatch in {segment:?} segment")]
    CrcMismatch {
        /// Which segment failed validation
        segment: Segment,
    },

    /// Post-decryption integrity check failed, which points at wrong key
    /// material (sensor identity mismatch) rather than transport corruption.
    #[error("Decryption produced an invalid plaintext")]
    DecryptionFailed,

    /// Patch info prefix not present in the variant registry.
    #[error("Unsupported sensor variant (patch info prefix {prefix:#04x})")]
    UnsupportedVariant {
        /// The unrecognized patch-info prefix byte
        prefix: u8,
    },

    /// No calibration parameters available (none cached, none derivable from
    /// the block, none supplied remotely). Downstream must not fabricate a
    /// glucose value.
    #[error("No calibration parameters available for this sensor")]
    CalibrationMissing,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ParseError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InsufficientData { required, available } => {
                defmt::write!(fmt, "Need {} bytes, have {}", required, available)
            }
            Self::CrcMismatch { .. } => defmt::write!(fmt, "CRC mismatch"),
            Self::DecryptionFailed => defmt::write!(fmt, "Decryption failed"),
            Self::UnsupportedVariant { prefix } => {
                defmt::write!(fmt, "Unsupported variant {:#04x}", prefix)
            }
            Self::CalibrationMissing => defmt::write!(fmt, "Calibration missing"),
        }
    }
}
