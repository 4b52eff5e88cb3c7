//! Tests for command encoding and form selection

mod common;

use common::*;

#[test]
fn test_encode_register_short_form() {
    let encoded = encode(REGISTER_HEADER, &register_payload(), None, 512).expect("Failed to encode");

    assert_eq!(encoded.form(), LengthForm::Short);
    assert_eq!(hex::encode(encoded.bytes()), REGISTER_COMMAND_HEX);
    assert!(!encoded.requires_fragmentation());
}

#[test]
fn test_encode_short_with_le() {
    let encoded = encode(
        CommandHeader::new(0x00, 0x02, 0x07, 0x00),
        &[0xAA, 0xBB],
        Some(0x40),
        512,
    )
    .unwrap();

    assert_eq!(hex::encode(encoded.bytes()), "0002070002aabb40");
}

#[test]
fn test_encode_short_le_256_is_zero() {
    let encoded = encode(CommandHeader::new(0x00, 0x03, 0x00, 0x00), &[], Some(256), 512).unwrap();

    assert_eq!(encoded.form(), LengthForm::Short);
    assert_eq!(hex::encode(encoded.bytes()), "000300000000");
}

#[test]
fn test_encode_short_without_data_or_le() {
    let encoded = encode(CommandHeader::new(0x80, 0x12, 0x01, 0x00), &[], None, 512).unwrap();

    // Lc is always present in short form, even when there is no data
    assert_eq!(hex::encode(encoded.bytes()), "8012010000");
}

#[test]
fn test_encode_extended_for_large_data() {
    let data = counting_payload(300);
    let encoded = encode(REGISTER_HEADER, &data, Some(65536), usize::MAX).unwrap();
    let bytes = encoded.bytes();

    assert_eq!(encoded.form(), LengthForm::Extended);
    assert_eq!(&bytes[..4], &[0x00, 0x01, 0x03, 0x00]);
    assert_eq!(bytes[4], EXTENDED_LENGTH_MARKER, "Extended form must start with the 00 marker");
    assert_eq!(&bytes[5..7], &[0x01, 0x2C], "Lc must be big-endian 300");
    assert_eq!(&bytes[7..307], data.as_slice());
    assert_eq!(&bytes[307..], &[0x00, 0x00], "Le 65536 encodes as 0000");
    assert_eq!(bytes.len(), 4 + 3 + 300 + 2);
}

#[test]
fn test_encode_extended_for_large_le_without_data() {
    let encoded = encode(CommandHeader::new(0x00, 0xB0, 0x00, 0x00), &[], Some(0x0400), 512).unwrap();

    assert_eq!(encoded.form(), LengthForm::Extended);
    // header, 00 marker, Lc=0000, Le=0400
    assert_eq!(hex::encode(encoded.bytes()), "00b000000000000400");
}

#[test]
fn test_prefer_extended_forces_extended_form() {
    let config = EncoderConfig {
        prefer_extended: true,
        ..EncoderConfig::default()
    };
    let command = Command::new(REGISTER_HEADER)
        .with_data(register_payload())
        .with_expected_len(0);
    let encoded = command.encode(&config).unwrap();

    assert_eq!(encoded.form(), LengthForm::Extended);
    assert_eq!(&encoded.bytes()[4..7], &[0x00, 0x00, 0x40]);
    assert_eq!(&encoded.bytes()[71..], &[0x00, 0x00]);
}

#[test]
fn test_frame_limit_flags_fragmentation() {
    let encoded = encode(REGISTER_HEADER, &register_payload(), None, 20).unwrap();

    assert!(encoded.requires_fragmentation());
    assert_eq!(encoded.frame_limit(), 20);
    // the encoder still produces the whole command, unsplit
    assert_eq!(encoded.len(), 69);
}

#[test]
fn test_frame_limit_exact_fit() {
    let encoded = encode(REGISTER_HEADER, &register_payload(), None, 69).unwrap();
    assert!(!encoded.requires_fragmentation());
}

#[test]
fn test_encode_length_overflow() {
    let data = vec![0u8; 65536];
    let result = encode(REGISTER_HEADER, &data, None, usize::MAX);

    assert!(
        matches!(result, Err(ApduError::LengthOverflow(65536))),
        "Expected LengthOverflow, got {:?}",
        result
    );
}

#[test]
fn test_encode_invalid_expected_length() {
    let result = encode(REGISTER_HEADER, &[], Some(65537), usize::MAX);

    assert!(
        matches!(result, Err(ApduError::InvalidExpectedLength(65537))),
        "Expected InvalidExpectedLength, got {:?}",
        result
    );
}

#[test]
fn test_short_form_boundary_grid() {
    let cases = [
        (255, None, LengthForm::Short),
        (255, Some(256), LengthForm::Short),
        (256, None, LengthForm::Extended),
        (0, Some(257), LengthForm::Extended),
        (1, Some(1), LengthForm::Short),
    ];

    for (len, le, expected) in cases {
        let encoded = encode(REGISTER_HEADER, &counting_payload(len), le, usize::MAX).unwrap();
        assert_eq!(
            encoded.form(),
            expected,
            "data len {} with Le {:?} should use {} form",
            len,
            le,
            expected
        );
    }
}
