//! Byte-level behaviour of generated records against known encodings and
//! against independent protobuf implementations.

mod common;

use common::{fixtures_proto, Color, Sample, Trickle, CONCRETE};
use pretty_assertions::assert_eq;
use prost::Message as _;
use prost_types::FileDescriptorSet;
use strela_core::wire::{decode_varint, encode_varint};
use strela_core::{Message, MessageBuilder, MessageWrite};

fn sample_strings(sample: &Sample) -> Vec<String> {
    sample
        .b()
        .objects_as::<String>()
        .unwrap()
        .into_iter()
        .cloned()
        .collect()
}

#[test]
fn test_concrete_payload() {
    let sample = Sample::parse_from_bytes(&CONCRETE).unwrap();

    assert!(sample.has_a());
    assert_eq!(sample.a(), 150);
    assert_eq!(sample_strings(&sample), vec!["x", "yy"]);
    assert!(!sample.has_color());
    assert!(!sample.has_inner());
    assert!(sample.unknown_fields().is_empty());

    assert_eq!(sample.to_bytes().unwrap(), CONCRETE.to_vec());
    assert_eq!(sample.serialized_size(), CONCRETE.len());
}

#[test]
fn test_trickling_reader_matches_slice() {
    let from_slice = Sample::parse_from_bytes(&CONCRETE).unwrap();
    let from_reader = Sample::parse_from_reader(Trickle(&CONCRETE)).unwrap();
    assert_eq!(from_reader, from_slice);
}

#[test]
fn test_packed_and_unpacked_sint32() {
    let mut builder = Sample::builder();
    builder.add_nums(-1).unwrap().add_nums(2).unwrap();
    let sample = builder.build().unwrap();

    // Declared packed: one length-delimited run of zigzag varints
    assert_eq!(sample.to_bytes().unwrap(), vec![0x22, 0x02, 0x01, 0x04]);

    // Unpacked occurrences decode into the same array
    let unpacked = Sample::parse_from_bytes(&[0x20, 0x01, 0x20, 0x04]).unwrap();
    assert_eq!(unpacked.nums().as_int32_slice().unwrap(), &[-1, 2]);
    assert_eq!(unpacked, sample);
}

#[test]
fn test_unknown_fields_survive_reencoding() {
    // a: 1, then field 9 varint 7, then field 10 "z"
    let data = [0x08, 0x01, 0x48, 0x07, 0x52, 0x01, 0x7A];
    let sample = Sample::parse_from_bytes(&data).unwrap();

    assert_eq!(sample.a(), 1);
    assert!(sample.unknown_fields().has_field(9));
    assert!(sample.unknown_fields().has_field(10));
    assert_eq!(sample.to_bytes().unwrap(), data.to_vec());
}

#[test]
fn test_undeclared_enum_number_is_unknown() {
    let sample = Sample::parse_from_bytes(&[0x18, 0x05]).unwrap();
    assert!(!sample.has_color());
    assert_eq!(sample.color(), Color::Red);
    assert!(sample.unknown_fields().has_field(3));
    assert_eq!(sample.to_bytes().unwrap(), vec![0x18, 0x05]);

    let declared = Sample::parse_from_bytes(&[0x18, 0x02]).unwrap();
    assert_eq!(declared.color(), Color::Blue);
}

#[test]
fn test_varints_match_prost() {
    for value in [0u64, 1, 127, 128, 300, 1 << 35, u64::MAX] {
        let mut ours = Vec::new();
        encode_varint(value, &mut ours);
        let mut theirs = Vec::new();
        prost::encoding::encode_varint(value, &mut theirs);
        assert_eq!(ours, theirs, "value {}", value);
        assert_eq!(decode_varint(&theirs).unwrap(), (value, theirs.len()));
    }
}

fn reflect_pool() -> prost_reflect::DescriptorPool {
    prost_reflect::DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![fixtures_proto()],
    })
    .unwrap()
}

#[test]
fn test_prost_reflect_reads_our_encoding() {
    let mut builder = Sample::builder();
    builder
        .set_a(-5)
        .set_color(Color::Green)
        .add_b("hello")
        .unwrap()
        .add_nums(-300)
        .unwrap();
    let bytes = builder.build().unwrap().to_bytes().unwrap();

    let descriptor = reflect_pool().get_message_by_name("fixtures.Sample").unwrap();
    let decoded = prost_reflect::DynamicMessage::decode(descriptor, bytes.as_slice()).unwrap();

    assert_eq!(
        *decoded.get_field_by_name("a").unwrap(),
        prost_reflect::Value::I32(-5)
    );
    assert_eq!(
        *decoded.get_field_by_name("color").unwrap(),
        prost_reflect::Value::EnumNumber(1)
    );
    assert_eq!(
        *decoded.get_field_by_name("b").unwrap(),
        prost_reflect::Value::List(vec![prost_reflect::Value::String("hello".into())])
    );
    assert_eq!(
        *decoded.get_field_by_name("nums").unwrap(),
        prost_reflect::Value::List(vec![prost_reflect::Value::I32(-300)])
    );
}

#[test]
fn test_we_read_prost_reflect_encoding() {
    let descriptor = reflect_pool().get_message_by_name("fixtures.Sample").unwrap();
    let mut message = prost_reflect::DynamicMessage::new(descriptor);
    message.set_field_by_name("a", prost_reflect::Value::I32(150));
    message.set_field_by_name(
        "b",
        prost_reflect::Value::List(vec![
            prost_reflect::Value::String("x".into()),
            prost_reflect::Value::String("yy".into()),
        ]),
    );
    let bytes = message.encode_to_vec();

    let sample = Sample::parse_from_bytes(&bytes).unwrap();
    assert_eq!(sample.a(), 150);
    assert_eq!(sample_strings(&sample), vec!["x", "yy"]);
}
