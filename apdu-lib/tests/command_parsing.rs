//! Tests for parsing encoded commands back into their fields

mod common;

use common::*;

#[test]
fn test_parse_register_command() {
    let command = Command::try_from(hex_to_bytes(REGISTER_COMMAND_HEX)).expect("Failed to parse");

    assert_eq!(command.header, REGISTER_HEADER);
    assert_eq!(command.data.as_ref(), register_payload().as_slice());
    assert_eq!(command.expected_len, None);
}

#[test]
fn test_parse_short_with_le() {
    let command = Command::try_from(hex_to_bytes("0002070002aabb40")).unwrap();

    assert_eq!(command.header, CommandHeader::new(0x00, 0x02, 0x07, 0x00));
    assert_eq!(command.data.as_ref(), &[0xAA, 0xBB]);
    assert_eq!(command.expected_len, Some(0x40));
}

#[test]
fn test_parse_short_le_zero_means_256() {
    let command = Command::try_from(hex_to_bytes("000300000000")).unwrap();

    assert!(command.data.is_empty());
    assert_eq!(command.expected_len, Some(256));
}

#[test]
fn test_parse_empty_short_body() {
    let command = Command::try_from(hex_to_bytes("8012010000")).unwrap();

    assert!(command.data.is_empty());
    assert_eq!(command.expected_len, None);
}

#[test]
fn test_parse_extended_round_trip() {
    let original = Command::new(REGISTER_HEADER)
        .with_data(counting_payload(1024))
        .with_expected_len(65536);
    let bytes = original.to_bytes().unwrap();
    assert_eq!(bytes[4], EXTENDED_LENGTH_MARKER);

    let parsed = Command::try_from(bytes).unwrap();
    assert_eq!(parsed, original);
}

#[test]
fn test_parse_extended_without_le() {
    // header, 00 marker, Lc=0003, data
    let command = Command::try_from(hex_to_bytes("00010300000003010203")).unwrap();

    assert_eq!(command.data.as_ref(), &[0x01, 0x02, 0x03]);
    assert_eq!(command.expected_len, None);
}

#[test]
fn test_parse_extended_empty_data_with_le() {
    let command = Command::try_from(hex_to_bytes("00b000000000000400")).unwrap();

    assert!(command.data.is_empty());
    assert_eq!(command.expected_len, Some(0x0400));
}

#[test]
fn test_short_form_round_trip_sweep() {
    let header = CommandHeader::new(0x80, 0x2A, 0x9E, 0x9A);

    for len in 0..=MAX_SHORT_DATA_LEN {
        let data = counting_payload(len);
        for le in [None, Some(1), Some(255), Some(256)] {
            let encoded = encode(header, &data, le, usize::MAX).unwrap();
            assert_eq!(encoded.form(), LengthForm::Short, "len {} Le {:?}", len, le);

            let parsed = Command::try_from(encoded.into_bytes())
                .unwrap_or_else(|e| panic!("len {} Le {:?} failed to parse: {:?}", len, le, e));
            assert_eq!(parsed.header, header);
            assert_eq!(parsed.data.as_ref(), data.as_slice(), "len {} Le {:?}", len, le);
            assert_eq!(parsed.expected_len, le, "len {} Le {:?}", len, le);
        }
    }
}

#[test]
fn test_parse_too_short() {
    let result = Command::try_from(hex_to_bytes("00010300"));

    assert!(
        matches!(result, Err(ApduError::InsufficientData { expected: 5, actual: 4 })),
        "Expected InsufficientData, got {:?}",
        result
    );
}

#[test]
fn test_parse_inconsistent_short_lc() {
    // Lc says 4 bytes but only 2 follow
    let result = Command::try_from(hex_to_bytes("0001030004aabb"));

    assert!(
        matches!(result, Err(ApduError::InconsistentLength { declared: 4, actual: 2 })),
        "Expected InconsistentLength, got {:?}",
        result
    );
}

#[test]
fn test_parse_inconsistent_extended_lc() {
    // Lc says 0x0010 bytes but only 3 follow
    let result = Command::try_from(hex_to_bytes("00010300000010010203"));

    assert!(
        matches!(result, Err(ApduError::InconsistentLength { declared: 16, actual: 3 })),
        "Expected InconsistentLength, got {:?}",
        result
    );
}

#[test]
fn test_command_display() {
    let command = Command::new(CommandHeader::new(0x00, 0x02, 0x07, 0x00))
        .with_data(vec![0xAA, 0xBB])
        .with_expected_len(64);

    assert_eq!(
        command.to_string(),
        "CLA=00 INS=02 P1=07 P2=00 Lc=2 data=aabb Le=64"
    );
}
