//! Sensor Identity Cipher
//!
//! The sensor obfuscates its memory image and its BLE notifications with a
//! proprietary stream transform keyed by the sensor's identity. This module
//! reproduces that transform and the command payloads built on top of it.
//!
//! ## The primitive
//!
//! Everything reduces to one non-linear shift-register step over 16-bit
//! words:
//!
//! ```text
//! op(v, k1, k2) = (v >> 2)  [^ k2 if bit 0 of v]  [^ k1 if bit 1 of v]
//! ```
//!
//! [`process_crypto`] chains eight `op` rounds with feedback taps against a
//! fixed four-word key and folds the round outputs pairwise, which is enough
//! avalanche that one flipped seed bit scrambles all four output words.
//! Keystreams for memory decryption and BLE payloads, the activation/enable
//! blocks, and the streaming unlock command are all derived from it with
//! different seeds.
//!
//! ## Purity
//!
//! Every function here is pure: all parameters are explicit (the key pair is
//! a tagged [`KeyPair`] argument, not ambient state) and identical inputs
//! always reproduce identical outputs. The unlock payload in particular must
//! be byte-stable - the sensor keeps a hardware unlock counter that desyncs
//! irreversibly if the host ever sends a payload built differently.

use crate::crc::crc16;
use crate::errors::{ParseError, ParseResult};

/// Fixed four-word transform key shared by all sensor generations.
const CRYPT_KEY: [u16; 4] = [0xA0C5, 0x6860, 0x0000, 0x14C6];

/// Seed tail word mixed into every derivation.
const SEED_TAIL: u16 = 0x241A;

/// XOR constants folding the transform output into activation/enable bytes.
const OUTPUT_XOR: [u16; 2] = [0x4163, 0x4344];

/// Patch-info prefix of the variant using the alternate key pair.
const US_PREFIX: u8 = 0x76;

/// Bytes in an encrypted BLE notification payload.
pub const BLE_PAYLOAD_BYTES: usize = 46;

/// Bytes of plaintext recovered from a BLE payload.
pub const BLE_PLAINTEXT_BYTES: usize = 44;

/// Offset of the internal CRC within the BLE plaintext.
const BLE_CRC_OFFSET: usize = 42;

/// Sub-blocks in the 344-byte memory image (8 bytes each).
const FRAM_SUB_BLOCKS: usize = 43;

/// Selects which word pair keys the `op` rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPair {
    /// The pair used by every variant except the US generation-2 sensors
    Default,
    /// The pair used by US generation-2 sensors
    Us,
}

impl KeyPair {
    /// Pick the key pair from a patch-info prefix.
    pub fn for_patch_info(patch_info: &[u8]) -> Self {
        match patch_info.first() {
            Some(&US_PREFIX) => Self::Us,
            _ => Self::Default,
        }
    }

    const fn words(self) -> (u16, u16) {
        match self {
            Self::Default => (CRYPT_KEY[0], CRYPT_KEY[1]),
            Self::Us => (0xA45D, 0x61B7),
        }
    }
}

fn word(hi: u8, lo: u8) -> u16 {
    ((hi as u16) << 8) | lo as u16
}

fn byte_at(bytes: &[u8], index: usize) -> u8 {
    bytes.get(index).copied().unwrap_or(0)
}

/// One shift-register step: shift right two, conditionally folding the key
/// words selected by the two bits shifted out.
pub fn op(value: u16, k1: u16, k2: u16) -> u16 {
    let mut result = value >> 2;
    if value & 0x01 != 0 {
        result ^= k2;
    }
    if value & 0x02 != 0 {
        result ^= k1;
    }
    result
}

/// Eight chained `op` rounds over four seed words with the default key.
pub fn process_crypto(seed: [u16; 4]) -> [u16; 4] {
    process_crypto_with(KeyPair::Default, seed)
}

/// Eight chained `op` rounds with an explicitly selected key pair.
pub fn process_crypto_with(pair: KeyPair, seed: [u16; 4]) -> [u16; 4] {
    let (k1, k2) = pair.words();
    let r0 = op(seed[0], k1, k2) ^ seed[3];
    let r1 = op(r0, k1, k2) ^ seed[2];
    let r2 = op(r1, k1, k2) ^ seed[1];
    let r3 = op(r2, k1, k2) ^ seed[0];
    let r4 = op(r3, k1, k2);
    let r5 = op(r4 ^ r0, k1, k2);
    let r6 = op(r5 ^ r1, k1, k2);
    let r7 = op(r6 ^ r2, k1, k2);
    [r3 ^ r7, r2 ^ r6, r1 ^ r5, r0 ^ r4]
}

fn seed_words(uid: &[u8; 8], x: u16, y: u16) -> [u16; 4] {
    [
        word(uid[5], uid[4]).wrapping_add(x).wrapping_add(y),
        word(uid[3], uid[2]).wrapping_add(CRYPT_KEY[2]),
        word(uid[1], uid[0]).wrapping_add(x.wrapping_mul(2)),
        SEED_TAIL ^ CRYPT_KEY[3],
    ]
}

/// Derive the four activation/enable bytes for a UID and parameter pair.
///
/// Seeds the transform from the UID words plus `x` and `y`, runs one
/// [`process_crypto`] pass, and XOR-folds the first two output words against
/// the fixed output constants. Little-endian byte order.
pub fn useful_function(uid: &[u8; 8], x: u16, y: u16) -> [u8; 4] {
    let out = process_crypto(seed_words(uid, x, y));
    let w0 = out[0] ^ OUTPUT_XOR[0];
    let w1 = out[1] ^ OUTPUT_XOR[1];
    [w0 as u8, (w0 >> 8) as u8, w1 as u8, (w1 >> 8) as u8]
}

/// Parameter selecting the activation derivation of [`useful_function`].
const ACTIVATION_X: u16 = 0x001A;

/// Parameter selecting the streaming-enable derivation.
const ENABLE_X: u16 = 0x001E;

/// Build the 12-byte streaming unlock command payload.
///
/// Derives the activation block from the patch-info identity word and the
/// enable block from the unlock counter, reduces both through the segment
/// CRC16, and runs a second transform pass over those intermediates together
/// with the 4-byte enable timer. Layout: timer (LE) followed by the four
/// mixed words (LE).
pub fn streaming_unlock_payload(
    uid: &[u8; 8],
    patch_info: &[u8],
    enable_time: u32,
    unlock_count: u16,
) -> [u8; 12] {
    let info_word = word(byte_at(patch_info, 5), byte_at(patch_info, 4));
    let activation = useful_function(uid, ACTIVATION_X, info_word);
    let enable = useful_function(uid, ENABLE_X, unlock_count);

    let timer = enable_time.to_le_bytes();
    let mut timed = [0u8; 8];
    timed[..4].copy_from_slice(&timer);
    timed[4..].copy_from_slice(&enable);

    let mixed = process_crypto([
        crc16(&activation),
        crc16(&timed),
        (enable_time & 0xFFFF) as u16,
        ((enable_time >> 16) as u16) ^ unlock_count,
    ]);

    let mut payload = [0u8; 12];
    payload[..4].copy_from_slice(&timer);
    for (i, w) in mixed.iter().enumerate() {
        payload[4 + i * 2..6 + i * 2].copy_from_slice(&w.to_le_bytes());
    }
    payload
}

fn ble_keystream(uid: &[u8; 8], nonce: u16) -> [u8; 64] {
    let mut seed = [
        word(uid[5], uid[4]).wrapping_add(nonce),
        word(uid[3], uid[2]).wrapping_add(CRYPT_KEY[2]),
        word(uid[1], uid[0]),
        SEED_TAIL ^ CRYPT_KEY[3],
    ];
    let mut stream = [0u8; 64];
    for chunk in 0..8 {
        seed = process_crypto(seed);
        for (i, w) in seed.iter().enumerate() {
            stream[chunk * 8 + i * 2..chunk * 8 + i * 2 + 2].copy_from_slice(&w.to_le_bytes());
        }
    }
    stream
}

/// Decrypt one BLE notification payload.
///
/// The first two payload bytes are the keystream nonce; the remaining 44 are
/// ciphertext. The keystream comes from eight chained [`process_crypto`]
/// iterations in output-feedback mode. After XOR, the plaintext carries its
/// own CRC16 (little-endian over bytes 0..42 at 42..44); a mismatch means
/// the key material is wrong and surfaces as
/// [`ParseError::DecryptionFailed`].
pub fn decrypt_ble(uid: &[u8; 8], payload: &[u8]) -> ParseResult<[u8; BLE_PLAINTEXT_BYTES]> {
    if payload.len() < BLE_PAYLOAD_BYTES {
        return Err(ParseError::InsufficientData {
            required: BLE_PAYLOAD_BYTES,
            available: payload.len(),
        });
    }

    let nonce = word(payload[1], payload[0]);
    let stream = ble_keystream(uid, nonce);

    let mut plain = [0u8; BLE_PLAINTEXT_BYTES];
    for (i, byte) in plain.iter_mut().enumerate() {
        *byte = payload[2 + i] ^ stream[i];
    }

    let stored = u16::from_le_bytes([plain[BLE_CRC_OFFSET], plain[BLE_CRC_OFFSET + 1]]);
    if stored != crc16(&plain[..BLE_CRC_OFFSET]) {
        return Err(ParseError::DecryptionFailed);
    }
    Ok(plain)
}

fn fram_keystream(pair: KeyPair, uid: &[u8; 8], info_word: u16, block: u16) -> [u8; 8] {
    let out = process_crypto_with(
        pair,
        [
            word(uid[5], uid[4]).wrapping_add(block),
            word(uid[3], uid[2]).wrapping_add(CRYPT_KEY[2]),
            word(uid[1], uid[0]).wrapping_add(block.wrapping_mul(2)),
            info_word ^ CRYPT_KEY[3],
        ],
    );
    let mut stream = [0u8; 8];
    for (i, w) in out.iter().enumerate() {
        stream[i * 2..i * 2 + 2].copy_from_slice(&w.to_le_bytes());
    }
    stream
}

/// Decrypt a full 344-byte memory image.
///
/// The image is ciphered in 43 independent 8-byte sub-blocks, each XORed
/// with a keystream seeded from the sub-block index, the UID words, and the
/// patch-info identity word. The US generation-2 variant keys the transform
/// with the alternate pair. XOR makes this its own inverse, which the tests
/// lean on.
pub fn decrypt_fram(uid: &[u8; 8], patch_info: &[u8], cipher_text: &[u8]) -> ParseResult<[u8; 344]> {
    if cipher_text.len() < FRAM_SUB_BLOCKS * 8 {
        return Err(ParseError::InsufficientData {
            required: FRAM_SUB_BLOCKS * 8,
            available: cipher_text.len(),
        });
    }

    let pair = KeyPair::for_patch_info(patch_info);
    let info_word = word(byte_at(patch_info, 5), byte_at(patch_info, 4));

    let mut plain = [0u8; 344];
    for block in 0..FRAM_SUB_BLOCKS {
        let stream = fram_keystream(pair, uid, info_word, block as u16);
        for i in 0..8 {
            plain[block * 8 + i] = cipher_text[block * 8 + i] ^ stream[i];
        }
    }
    Ok(plain)
}
