//! End-to-end pipeline tests: raw block in, calibrated readings out.
//!
//! Covers the error taxonomy (integrity, structure, variant, calibration),
//! the lifecycle gate, decryption, deduplication, and the reference-block
//! scenarios.

mod common;

use common::{
    expected_mg_dl, gen1_identity, gen2_identity, reference_block, BlockBuilder, CODES,
    PRO_H_INFO, UID,
};

use glucoflow_core::calibration::CalibrationParameters;
use glucoflow_core::cipher;
use glucoflow_core::constants::layout::PRO_H;
use glucoflow_core::constants::time::MS_PER_MINUTE;
use glucoflow_core::crc::Segment;
use glucoflow_core::{parse_block, ParseError, SensorIdentity, SensorState, SensorStore};

const READ_TIME: u64 = 1_700_000_000_000;

#[test]
fn all_zero_block_is_an_integrity_error() {
    // Status claims Ready and the sensor time is nonzero, but the checksum
    // bytes are zero over nonzero data - the whole parse is discarded.
    let block = BlockBuilder::standard()
        .status(3)
        .minutes(4000)
        .unsealed();
    let mut store = SensorStore::new();
    let result = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None);
    assert!(matches!(result, Err(ParseError::CrcMismatch { .. })));
}

#[test]
fn corrupted_body_names_the_segment() {
    let mut block = reference_block(4000, 1500, 7000);
    block[200] ^= 0x01;
    let mut store = SensorStore::new();
    let result = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None);
    assert_eq!(
        result.err(),
        Some(ParseError::CrcMismatch { segment: Segment::Body })
    );
}

#[test]
fn short_block_fails_closed() {
    let block = [0u8; 100];
    let mut store = SensorStore::new();
    let result = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None);
    assert!(matches!(result, Err(ParseError::InsufficientData { .. })));
}

#[test]
fn unknown_prefix_is_unsupported() {
    let block = reference_block(4000, 1500, 7000);
    let identity = SensorIdentity::new(UID, Some(&[0x42, 0, 0, 0, 0, 0]));
    let mut store = SensorStore::new();
    let result = parse_block(&block, 0, &identity, &mut store, READ_TIME, None);
    assert_eq!(result.err(), Some(ParseError::UnsupportedVariant { prefix: 0x42 }));
}

#[test]
fn reference_block_decodes_to_known_value_and_timestamp() {
    let block = reference_block(4000, 1500, 7000);
    let mut store = SensorStore::new();
    let output = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None).unwrap();

    assert_eq!(output.state, SensorState::Ready);
    assert_eq!(output.age_minutes, 4000);
    assert!(!output.readings.is_empty());

    // The newest reading carries the read time exactly, and the uniform
    // raw values survive smoothing untouched (constant series are fixed
    // points of every stage).
    let newest = output.readings.last().unwrap();
    assert_eq!(newest.timestamp, READ_TIME);
    let expected = expected_mg_dl(1500.0, 7000.0);
    assert!((newest.mg_dl - expected).abs() < 1e-6);

    // Oldest to newest, strictly increasing
    for pair in output.readings.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
}

#[test]
fn emission_is_thinned_to_the_dedup_window() {
    let block = reference_block(4000, 1500, 7000);
    let mut store = SensorStore::new();
    let output = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None).unwrap();

    // Apart from the newest sample, consecutive emissions sit at least
    // five minutes apart.
    for pair in output.readings.windows(2) {
        let gap = pair[1].timestamp - pair[0].timestamp;
        let is_last = pair[1].timestamp == READ_TIME;
        assert!(gap >= 5 * MS_PER_MINUTE || is_last);
    }
}

#[test]
fn reparsing_the_same_block_emits_nothing() {
    let block = reference_block(4000, 1500, 7000);
    let mut store = SensorStore::new();
    let first = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None).unwrap();
    assert!(!first.readings.is_empty());

    let second = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None).unwrap();
    assert!(second.readings.is_empty());
}

#[test]
fn cutoff_limits_how_far_back_extraction_goes() {
    let block = reference_block(4000, 1500, 7000);
    let mut store = SensorStore::new();
    let cutoff = READ_TIME - 10 * MS_PER_MINUTE;
    let output =
        parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, Some(cutoff)).unwrap();
    assert!(output.readings.iter().all(|r| r.timestamp >= cutoff));
}

#[test]
fn warmup_gate_holds_readings_back() {
    let block = reference_block(45, 1500, 7000);
    let mut store = SensorStore::new();
    let output = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None).unwrap();
    assert_eq!(output.state, SensorState::Ready);
    assert_eq!(output.age_minutes, 45);
    assert!(output.readings.is_empty());
}

#[test]
fn non_ready_states_hold_readings_back() {
    for (byte, state) in [
        (1, SensorState::NotYetStarted),
        (2, SensorState::Starting),
        (4, SensorState::Expired),
        (5, SensorState::Shutdown),
        (6, SensorState::Failure),
        (9, SensorState::Unknown),
    ] {
        let block = BlockBuilder::standard()
            .status(byte)
            .minutes(4000)
            .trend_uniform(5, 1500, 7000)
            .history_uniform(4000, 1500, 7000)
            .calibration_codes(CODES)
            .seal();
        let mut store = SensorStore::new();
        let output = parse_block(&block, 0, &gen1_identity(), &mut store, READ_TIME, None).unwrap();
        assert_eq!(output.state, state);
        assert!(output.readings.is_empty());
    }
}

#[test]
fn encrypted_generation_roundtrips_through_the_cipher() {
    let identity = gen2_identity();
    let plain = reference_block(4000, 1500, 7000);

    // The memory cipher is a keystream XOR, so running the decryption over
    // plaintext produces the ciphertext the sensor would have sent.
    let mut image = [0u8; 344];
    image.copy_from_slice(&plain);
    let encrypted = cipher::decrypt_fram(identity.uid(), identity.patch_info(), &image).unwrap();

    let mut store = SensorStore::new();
    let output = parse_block(&encrypted, 0, &identity, &mut store, READ_TIME, None).unwrap();
    assert_eq!(output.state, SensorState::Ready);
    assert_eq!(&output.plaintext[..], &plain[..]);

    let newest = output.readings.last().unwrap();
    assert!((newest.mg_dl - expected_mg_dl(1500.0, 7000.0)).abs() < 1e-6);
}

#[test]
fn wrong_identity_fails_the_integrity_check() {
    let identity = gen2_identity();
    let plain = reference_block(4000, 1500, 7000);
    let mut image = [0u8; 344];
    image.copy_from_slice(&plain);
    let encrypted = cipher::decrypt_fram(identity.uid(), identity.patch_info(), &image).unwrap();

    // Decrypting with a different UID yields garbage that cannot pass the
    // segment checksums.
    let wrong = SensorIdentity::new([0xFF; 8], Some(&common::GEN2_INFO));
    let mut store = SensorStore::new();
    let result = parse_block(&encrypted, 0, &wrong, &mut store, READ_TIME, None);
    assert!(matches!(result, Err(ParseError::CrcMismatch { .. })));
}

#[test]
fn transport_header_is_skipped() {
    let block = reference_block(4000, 1500, 7000);
    let mut framed = vec![0xEEu8; 8];
    framed.extend_from_slice(&block);

    let mut store = SensorStore::new();
    let output = parse_block(&framed, 8, &gen1_identity(), &mut store, READ_TIME, None).unwrap();
    let newest = output.readings.last().unwrap();
    assert!((newest.mg_dl - expected_mg_dl(1500.0, 7000.0)).abs() < 1e-6);
}

#[test]
fn professional_variant_needs_remote_calibration() {
    let identity = SensorIdentity::new(UID, Some(&PRO_H_INFO));
    let block = BlockBuilder::with_layout(&PRO_H)
        .status(3)
        .minutes(4000)
        .trend_uniform(5, 1500, 7000)
        .history_uniform(4000, 1500, 7000)
        .seal();

    let mut store = SensorStore::new();
    let result = parse_block(&block, 0, &identity, &mut store, READ_TIME, None);
    assert_eq!(result.err(), Some(ParseError::CalibrationMissing));

    // With remotely supplied parameters the same block decodes.
    store.supply_calibration(CalibrationParameters {
        slope_slope: 0.0,
        slope_offset: 0.0,
        offset_slope: 0.1,
        offset_offset: 0.0,
        serial: identity.serial(),
        valid: true,
    });
    let output = parse_block(&block, 0, &identity, &mut store, READ_TIME, None).unwrap();
    let newest = output.readings.last().unwrap();
    assert!((newest.mg_dl - 150.0).abs() < 1e-6);
}

#[test]
fn serial_change_resets_the_store() {
    let block_a = reference_block(4000, 1500, 7000);
    let mut store = SensorStore::new();
    let first =
        parse_block(&block_a, 0, &gen1_identity(), &mut store, READ_TIME, None).unwrap();
    assert!(!first.readings.is_empty());

    // A different physical sensor re-uses the store: the emission horizon
    // and calibration cache from sensor A must not bleed into sensor B.
    let identity_b = SensorIdentity::new([0x11; 8], Some(&common::GEN1_INFO));
    let block_b = reference_block(2000, 1800, 7200);
    let second =
        parse_block(&block_b, 0, &identity_b, &mut store, READ_TIME, None).unwrap();
    assert!(!second.readings.is_empty());
    let newest = second.readings.last().unwrap();
    assert!((newest.mg_dl - expected_mg_dl(1800.0, 7200.0)).abs() < 1e-6);
}
