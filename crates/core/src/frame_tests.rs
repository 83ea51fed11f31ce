// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

const LIMIT: usize = 1 << 20;

fn sample(payload: &[u8]) -> Record {
    Record::new(OriginId::new("node-a").unwrap(), 4, 9, 1234, payload.to_vec())
}

#[test]
fn encode_then_decode_preserves_record() {
    let record = sample(b"hello world");
    let bytes = encode(&record);
    assert_eq!(bytes.len(), encoded_len(&record));

    let (decoded, used) = decode(&bytes, LIMIT).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(used, bytes.len());
    assert!(decoded.verify());
}

#[test]
fn decode_consumes_only_first_frame() {
    let first = sample(b"one");
    let second = sample(b"two");
    let bytes = encode_all([&first, &second]);

    let (decoded, used) = decode(&bytes, LIMIT).unwrap();
    assert_eq!(decoded, first);
    let (decoded, _) = decode(&bytes[used..], LIMIT).unwrap();
    assert_eq!(decoded, second);
}

#[test]
fn short_header_is_incomplete() {
    assert_eq!(
        decode(&[0, 0], LIMIT),
        Err(FrameError::Incomplete {
            needed: HEADER_LEN,
            available: 2
        })
    );
}

#[test]
fn every_strict_prefix_is_incomplete() {
    let bytes = encode(&sample(b"abc"));
    for cut in 0..bytes.len() {
        assert!(
            matches!(decode(&bytes[..cut], LIMIT), Err(FrameError::Incomplete { .. })),
            "prefix of {} bytes",
            cut
        );
    }
}

#[test]
fn oversized_length_is_corrupt() {
    let bytes = encode(&sample(&[7u8; 100]));
    assert!(matches!(decode(&bytes, 50), Err(FrameError::Corrupt(_))));
}

#[test]
fn undersized_length_is_corrupt() {
    let mut bytes = encode(&sample(b"x"));
    bytes[..4].copy_from_slice(&3u32.to_be_bytes());
    assert!(matches!(decode(&bytes, LIMIT), Err(FrameError::Corrupt(_))));
}

#[test]
fn unknown_version_is_corrupt_even_with_valid_crc() {
    let mut bytes = encode(&sample(b"x"));
    bytes[HEADER_LEN] = 9;
    let crc_at = bytes.len() - TRAILER_LEN;
    let crc = crc32fast::hash(&bytes[..crc_at]);
    bytes[crc_at..].copy_from_slice(&crc.to_be_bytes());

    match decode(&bytes, LIMIT) {
        Err(FrameError::Corrupt(reason)) => assert!(reason.contains("version")),
        other => panic!("expected corrupt, got {:?}", other),
    }
}

#[test]
fn wrong_checksum_with_valid_crc_still_decodes() {
    let mut record = sample(b"payload");
    record.checksum = Checksum([0u8; 32]);
    let bytes = encode(&record);

    let (decoded, _) = decode(&bytes, LIMIT).unwrap();
    assert!(!decoded.verify());
}

#[test]
fn plausible_len_matches_encoded_frame() {
    let bytes = encode(&sample(b"abc"));
    assert_eq!(plausible_len(&bytes[..HEADER_LEN + 1], LIMIT), Some(bytes.len()));
    assert_eq!(plausible_len(&bytes[..HEADER_LEN], LIMIT), Some(bytes.len()));
}

#[test]
fn plausible_len_rejects_bad_prefixes() {
    let bytes = encode(&sample(b"abc"));
    assert_eq!(plausible_len(&bytes[..2], LIMIT), None);
    assert_eq!(plausible_len(&[0, 0, 0, 1, FRAME_VERSION], LIMIT), None);
    assert_eq!(plausible_len(&[0xff, 0xff, 0xff, 0xff, FRAME_VERSION], LIMIT), None);

    let mut wrong_version = bytes[..HEADER_LEN + 1].to_vec();
    wrong_version[HEADER_LEN] = 7;
    assert_eq!(plausible_len(&wrong_version, LIMIT), None);
}

proptest! {
    #[test]
    fn any_single_byte_flip_is_detected(
        payload in proptest::collection::vec(any::<u8>(), 0..64),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut bytes = encode(&sample(&payload));
        let at = index.index(bytes.len());
        bytes[at] ^= flip;
        prop_assert!(decode(&bytes, LIMIT).is_err());
    }
}
