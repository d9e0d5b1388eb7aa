//! Sensor Identity
//!
//! A sensor announces itself with an 8-byte UID and a short patch-info
//! sequence read during discovery. Both are immutable for the life of the
//! sensor: the UID keys every cipher derivation and the patch-info prefix
//! selects the variant. The serial number shown to users is a 5-bit
//! re-encoding of the UID.

use core::fmt;

use heapless::Vec;

/// Maximum patch-info bytes retained (the sensor reports 6).
pub const PATCH_INFO_BYTES: usize = 6;

/// Alphabet of the printed serial number (no B, I, O, S - they read as
/// digits on the sensor label).
const SERIAL_ALPHABET: &[u8; 32] = b"0123456789ACDEFGHJKLMNPQRTUVWXYZ";

/// Immutable identity of one physical sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorIdentity {
    uid: [u8; 8],
    patch_info: Vec<u8, PATCH_INFO_BYTES>,
}

impl SensorIdentity {
    /// Build an identity from the discovery UID and optional patch info.
    ///
    /// Patch info longer than [`PATCH_INFO_BYTES`] is truncated; shorter or
    /// absent patch info is kept as-is and classification falls back to the
    /// oldest plaintext variant.
    pub fn new(uid: [u8; 8], patch_info: Option<&[u8]>) -> Self {
        let mut info = Vec::new();
        if let Some(bytes) = patch_info {
            for &byte in bytes.iter().take(PATCH_INFO_BYTES) {
                // Capacity is PATCH_INFO_BYTES, take() bounds the iterator
                let _ = info.push(byte);
            }
        }
        Self { uid, patch_info: info }
    }

    /// The 8-byte UID.
    pub fn uid(&self) -> &[u8; 8] {
        &self.uid
    }

    /// The patch-info bytes (may be empty).
    pub fn patch_info(&self) -> &[u8] {
        &self.patch_info
    }

    /// The serial number binding calibration parameters to this sensor.
    pub fn serial(&self) -> SensorSerial {
        SensorSerial(self.uid)
    }
}

/// Serial number derived from the UID; the binding key of the calibration
/// cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorSerial(pub [u8; 8]);

impl fmt::Display for SensorSerial {
    /// Printed form: a leading generation digit and ten characters from the
    /// label alphabet, 5 bits each, taken from the UID payload bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = 0u64;
        for &byte in &self.0[2..8] {
            value = (value << 8) | byte as u64;
        }
        write!(f, "0")?;
        for k in 0..10 {
            let shift = 45 - 5 * k;
            let idx = ((value >> shift) & 0x1F) as usize;
            write!(f, "{}", SERIAL_ALPHABET[idx] as char)?;
        }
        Ok(())
    }
}
