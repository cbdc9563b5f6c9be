//! Malformed and oversized input is rejected with a typed error.

mod common;

use common::{Sample, Trickle, CONCRETE};
use strela_core::{
    CodedInputStream, Error, ExtensionRegistry, InputConfig, Message, UnknownFieldSet,
};

fn parse_with(data: &[u8], config: InputConfig) -> strela_core::Result<Sample> {
    let mut input = CodedInputStream::from_bytes_with_config(data, config);
    Sample::parse_from_coded_stream(&mut input, ExtensionRegistry::empty())
}

#[test]
fn test_recursion_limit_on_nested_records() {
    let nested = [0x2A, 0x02, 0x08, 0x07];
    assert!(parse_with(&nested, InputConfig::new().recursion_limit(1)).is_ok());
    assert!(matches!(
        parse_with(&nested, InputConfig::new().recursion_limit(0)),
        Err(Error::RecursionLimitExceeded { limit: 0 })
    ));
}

#[test]
fn test_recursion_limit_on_unknown_groups() {
    // Field 9 groups nested two and three deep
    let two = [0x4B, 0x4B, 0x4C, 0x4C];
    let three = [0x4B, 0x4B, 0x4B, 0x4C, 0x4C, 0x4C];

    let sample = parse_with(&two, InputConfig::new().recursion_limit(2)).unwrap();
    assert!(sample.unknown_fields().has_field(9));
    assert!(matches!(
        parse_with(&three, InputConfig::new().recursion_limit(2)),
        Err(Error::RecursionLimitExceeded { limit: 2 })
    ));
}

#[test]
fn test_size_limit_on_reader() {
    let mut input = CodedInputStream::with_config(Trickle(&CONCRETE), InputConfig::new().size_limit(4));
    assert!(matches!(
        Sample::parse_from_coded_stream(&mut input, ExtensionRegistry::empty()),
        Err(Error::SizeLimitExceeded { limit: 4 })
    ));
}

#[test]
fn test_size_limit_on_length_prefix() {
    let nested = [0x2A, 0x02, 0x08, 0x07];
    assert!(matches!(
        parse_with(&nested, InputConfig::new().size_limit(3)),
        Err(Error::SizeLimitExceeded { limit: 3 })
    ));
}

#[test]
fn test_truncated_input() {
    // b claims five bytes, one follows
    assert!(matches!(
        Sample::parse_from_bytes(&[0x12, 0x05, 0x78]),
        Err(Error::TruncatedMessage)
    ));
    assert!(matches!(
        Sample::parse_from_bytes(&[0x08]),
        Err(Error::TruncatedMessage)
    ));
}

#[test]
fn test_malformed_varint() {
    let data = [0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
    assert!(matches!(
        Sample::parse_from_bytes(&data),
        Err(Error::MalformedVarint { offset: 1 })
    ));
}

#[test]
fn test_field_number_zero() {
    assert!(matches!(
        Sample::parse_from_bytes(&[0x00, 0x01]),
        Err(Error::InvalidTag { .. })
    ));
}

#[test]
fn test_stray_end_group() {
    // An end-group tag with no open group
    assert!(matches!(
        Sample::parse_from_bytes(&[0x4C]),
        Err(Error::InvalidEndTag { .. })
    ));
    assert!(UnknownFieldSet::parse_from_bytes(&[0x4C]).is_err());
}

#[test]
fn test_mismatched_end_group() {
    // Group 9 closed by field 10's end tag
    assert!(Sample::parse_from_bytes(&[0x4B, 0x54]).is_err());
}

#[test]
fn test_invalid_utf8_string() {
    let data = [0x12, 0x01, 0xFF];
    assert!(matches!(
        Sample::parse_from_bytes(&data),
        Err(Error::InvalidUtf8(_))
    ));

    let lossy = parse_with(&data, InputConfig::new().strict_utf8(false)).unwrap();
    assert_eq!(
        lossy.b().objects_as::<String>().unwrap(),
        vec![&"\u{FFFD}".to_string()]
    );
}
