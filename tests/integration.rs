//! Integration tests: primitive, byte and list codecs, struct encode/decode, errors.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use wirestruct::dump::format_record;
use wirestruct::{Codec, CodecError, Compute, Context, EnumDef, IntCodec, Record, StructDef, Value};

fn roundtrip(codec: &Codec, v: &Value) -> anyhow::Result<Value> {
    let bytes = codec.encode(&mut Context::new(), v)?;
    Ok(codec.decode(&mut Context::new(), &bytes)?)
}

fn ints(items: &[u64]) -> Value {
    Value::List(items.iter().copied().map(Value::Int).collect())
}

// ==================== Structs ====================

#[test]
fn struct_fields_encode_in_declaration_order() -> anyhow::Result<()> {
    let def = StructDef::builder("Pair")
        .field_with_default("a", Codec::u8(), 5u64)
        .field_with_default("b", Codec::u16(), 300u64)
        .build()?;
    let record = Record::new(&def);
    assert_eq!(record.encode(&mut Context::new())?, b"\x05\x01\x2c");
    Ok(())
}

#[test]
fn struct_decode_builds_new_record() -> anyhow::Result<()> {
    let def = StructDef::builder("Pair")
        .field("a", Codec::u8())
        .field("b", Codec::u16())
        .build()?;
    let mut ctx = Context::new();
    let record = def.decode(&mut ctx, b"\x05\x01\x2c")?;
    assert_eq!(ctx.index, 3);
    assert_eq!(record.get("a"), Some(&Value::Int(5)));
    assert_eq!(record.get("b"), Some(&Value::Int(300)));
    assert_eq!(def.sizeof()?, 3);
    Ok(())
}

#[test]
fn missing_field_is_reported() -> anyhow::Result<()> {
    let def = StructDef::builder("S")
        .field("a", Codec::u8())
        .field("b", Codec::u8())
        .build()?;
    let record = Record::with_values(&def, [("a", 1u64)])?;
    let err = record.encode(&mut Context::new()).unwrap_err();
    assert!(matches!(err, CodecError::MissingField(ref name) if name == "b"));
    Ok(())
}

#[test]
fn type_mismatch_names_the_field() -> anyhow::Result<()> {
    let def = StructDef::builder("S")
        .field("id", Codec::u16())
        .field("addr", Codec::ipv4())
        .build()?;
    let record = Record::with_values(&def, [("id", Value::Int(1)), ("addr", Value::List(vec![]))])?;
    let err = record.to_bytes().unwrap_err();
    assert_eq!(err.field_path(), "addr");
    assert!(matches!(err.root(), CodecError::TypeMismatch { found: "list", .. }));
    assert!(err.to_string().contains("addr"));
    Ok(())
}

#[test]
fn unknown_field_is_rejected() -> anyhow::Result<()> {
    let def = StructDef::builder("S").field("a", Codec::u8()).build()?;
    let err = Record::with_values(&def, [("nope", 1u64)]).unwrap_err();
    assert!(matches!(err, CodecError::UnknownField(_)));
    Ok(())
}

#[test]
fn builder_rejects_duplicate_and_misplaced_greedy_fields() {
    let dup = StructDef::builder("S")
        .field("a", Codec::u8())
        .field("a", Codec::u16())
        .build();
    assert!(matches!(dup, Err(CodecError::Schema(_))));

    let greedy = StructDef::builder("S")
        .field("rest", Codec::greedy_bytes())
        .field("tail", Codec::u8())
        .build();
    assert!(matches!(greedy, Err(CodecError::Schema(_))));

    let greedy_last = StructDef::builder("S")
        .field("head", Codec::u8())
        .field("rest", Codec::greedy_list(Codec::u8()))
        .build();
    assert!(greedy_last.is_ok());
}

#[test]
fn count_of_is_computed_on_encode() -> anyhow::Result<()> {
    let def = StructDef::builder("Counted")
        .computed("count", Codec::u8(), Compute::CountOf("items".into()))
        .field("items", Codec::greedy_list(Codec::u8()))
        .build()?;
    let mut record = Record::with_values(&def, [("items", ints(&[7, 8, 9]))])?;
    assert_eq!(record.to_bytes()?, b"\x03\x07\x08\x09");

    let err = record.set("count", 4u64).unwrap_err();
    assert!(matches!(err, CodecError::ComputedField(_)));

    let decoded = def.parse_bytes(b"\x03\x07\x08\x09")?;
    assert_eq!(decoded.get("count"), Some(&Value::Int(3)));
    assert_eq!(decoded.to_bytes()?, b"\x03\x07\x08\x09");
    Ok(())
}

#[test]
fn length_of_and_custom_compute() -> anyhow::Result<()> {
    fn checksum(r: &Record) -> Result<Value, CodecError> {
        let payload = r
            .get("payload")
            .and_then(Value::as_bytes)
            .ok_or_else(|| CodecError::MissingField("payload".into()))?;
        Ok(Value::Int(payload.iter().map(|&b| u64::from(b)).sum::<u64>() & 0xff))
    }
    let def = StructDef::builder("Frame")
        .computed("len", Codec::u16(), Compute::LengthOf("payload".into()))
        .computed("sum", Codec::u8(), Compute::With(checksum))
        .field("payload", Codec::greedy_bytes())
        .build()?;
    let record = Record::with_values(&def, [("payload", Value::from(&b"\x01\x02\xff"[..]))])?;
    assert_eq!(record.to_bytes()?, b"\x00\x03\x02\x01\x02\xff");
    Ok(())
}

#[test]
fn computed_from_unknown_field_is_rejected() {
    let def = StructDef::builder("S")
        .computed("n", Codec::u8(), Compute::CountOf("missing".into()))
        .build();
    assert!(matches!(def, Err(CodecError::Schema(_))));
}

#[test]
fn nested_struct_errors_carry_the_path() -> anyhow::Result<()> {
    let inner = StructDef::builder("Inner")
        .field("x", Codec::u8())
        .field("y", Codec::u16())
        .build()?;
    let outer = StructDef::builder("Outer")
        .field("items", Codec::sized_list(8, Codec::record(inner))?)
        .build()?;
    let err = outer.parse_bytes(b"\x02\x01\x00\x02\x03\x00").unwrap_err();
    assert_eq!(err.field_path(), "items[1].y");
    assert!(matches!(err.root(), CodecError::Truncated { offset: 5, needed: 2, available: 1 }));
    Ok(())
}

#[test]
fn nested_struct_roundtrip_and_sizeof() -> anyhow::Result<()> {
    let point = StructDef::builder("Point")
        .field("x", Codec::u16())
        .field("y", Codec::u16())
        .build()?;
    let line = StructDef::builder("Line")
        .field("ends", Codec::static_list(2, Codec::record(point.clone())))
        .build()?;
    assert_eq!(line.sizeof()?, 8);

    let a = Record::with_values(&point, [("x", 1u64), ("y", 2u64)])?;
    let b = Record::with_values(&point, [("x", 3u64), ("y", 4u64)])?;
    let record = Record::with_values(&line, [("ends", Value::List(vec![a.into(), b.into()]))])?;
    let bytes = record.to_bytes()?;
    assert_eq!(bytes, b"\x00\x01\x00\x02\x00\x03\x00\x04");
    assert_eq!(line.parse_bytes(&bytes)?, record);
    Ok(())
}

#[test]
fn record_of_wrong_struct_is_a_type_mismatch() -> anyhow::Result<()> {
    let a = StructDef::builder("A").field("x", Codec::u8()).build()?;
    let b = StructDef::builder("B").field("x", Codec::u8()).build()?;
    let value = Value::Struct(Record::with_values(&b, [("x", 1u64)])?);
    let err = Codec::record(a).to_bytes(&value).unwrap_err();
    assert!(matches!(err, CodecError::TypeMismatch { .. }));
    Ok(())
}

#[test]
fn parse_bytes_rejects_trailing_data() -> anyhow::Result<()> {
    let def = StructDef::builder("S").field("a", Codec::u8()).build()?;
    let err = def.parse_bytes(b"\x01\x02").unwrap_err();
    assert!(matches!(err, CodecError::Malformed { offset: 1, .. }));
    Ok(())
}

#[test]
fn variable_struct_has_no_fixed_size() -> anyhow::Result<()> {
    let def = StructDef::builder("S")
        .field("a", Codec::u8())
        .field("name", Codec::domain())
        .build()?;
    assert!(matches!(def.sizeof(), Err(CodecError::NotFixedSize(_))));
    Ok(())
}

#[test]
fn dump_lists_fields() -> anyhow::Result<()> {
    let def = StructDef::builder("S")
        .field("a", Codec::u8())
        .field("tag", Codec::static_bytes(4))
        .field("b", Codec::u8())
        .build()?;
    let record = Record::with_values(&def, [("a", Value::Int(5)), ("tag", Value::from("ab"))])?;
    let text = format_record(&record);
    assert!(text.starts_with("S {"));
    assert!(text.contains("a: 5"));
    assert!(text.contains("tag: \"ab\""));
    assert!(text.contains("b: <unset>"));
    assert_eq!(record.to_string(), text);
    Ok(())
}

// ==================== Integers ====================

#[test]
fn int_roundtrip_at_the_edges() -> anyhow::Result<()> {
    for bits in [8u32, 16, 32, 64] {
        let codec = Codec::int(bits)?;
        let max = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        for v in [0, 1, max / 2, max - 1, max] {
            assert_eq!(roundtrip(&codec, &Value::Int(v))?, Value::Int(v), "int({bits}) value {v}");
        }
    }
    Ok(())
}

#[test]
fn int_is_big_endian() -> anyhow::Result<()> {
    assert_eq!(Codec::u32().to_bytes(&Value::Int(0x0102_0304))?, b"\x01\x02\x03\x04");
    let int24 = Codec::int(24)?;
    assert_eq!(int24.sizeof()?, 3);
    assert_eq!(int24.to_bytes(&Value::Int(0x12_3456))?, b"\x12\x34\x56");
    assert_eq!(int24.from_bytes(b"\x12\x34\x56")?, Value::Int(0x12_3456));
    Ok(())
}

#[test]
fn int_overflow_is_value_range() {
    let err = Codec::u8().to_bytes(&Value::Int(256)).unwrap_err();
    assert!(matches!(err, CodecError::ValueRange { .. }));
    let err = Codec::u16().to_bytes(&Value::Int(70_000)).unwrap_err();
    assert!(matches!(err, CodecError::ValueRange { .. }));
}

#[test]
fn int_width_must_be_whole_bytes() {
    for bits in [0u32, 12, 72] {
        assert!(matches!(Codec::int(bits), Err(CodecError::Schema(_))), "int({bits})");
    }
}

#[test]
fn int_rejects_non_integers() {
    let err = Codec::u16().to_bytes(&Value::from("12")).unwrap_err();
    assert!(matches!(err, CodecError::TypeMismatch { expected: "int", found: "string", .. }));
}

#[test]
fn truncated_int_is_an_error() {
    let mut ctx = Context::new();
    let err = Codec::u32().decode(&mut ctx, b"\x01\x02").unwrap_err();
    assert!(matches!(err, CodecError::Truncated { offset: 0, needed: 4, available: 2 }));
}

#[test]
fn enum_wraps_known_values() -> anyhow::Result<()> {
    let def = Arc::new(EnumDef::new(
        "RecordType",
        vec![("A".to_string(), 1), ("AAAA".to_string(), 28)],
    ));
    let codec = Codec::Int(IntCodec::new(16)?.with_enum(def));
    assert_eq!(
        codec.from_bytes(b"\x00\x01")?,
        Value::Enum { name: "A".into(), value: 1 }
    );
    assert_eq!(codec.from_bytes(b"\x00\x63")?, Value::Int(99));
    assert_eq!(codec.to_bytes(&Value::from("AAAA"))?, b"\x00\x1c");
    assert_eq!(codec.to_bytes(&Value::Int(5))?, b"\x00\x05");
    assert!(matches!(codec.to_bytes(&Value::from("BOGUS")), Err(CodecError::ValueRange { .. })));
    assert_eq!(codec.to_string(), "int(16) as RecordType");
    Ok(())
}

// ==================== Constants and addresses ====================

#[test]
fn const_encodes_only_its_value() -> anyhow::Result<()> {
    let codec = Codec::constant(&b"\x00PROTO"[..]);
    assert_eq!(codec.sizeof()?, 6);
    assert_eq!(codec.to_bytes(&Value::from(&b"\x00PROTO"[..]))?, b"\x00PROTO");
    assert!(matches!(codec.to_bytes(&Value::from("PROTO!")), Err(CodecError::Malformed { .. })));
    assert!(matches!(codec.from_bytes(b"\x00PROTX"), Err(CodecError::Malformed { offset: 0, .. })));
    assert!(matches!(codec.from_bytes(b"\x00PR"), Err(CodecError::Truncated { .. })));
    Ok(())
}

#[test]
fn const_field_defaults_to_its_value() -> anyhow::Result<()> {
    let def = StructDef::builder("Tagged")
        .field("magic", Codec::constant(&b"WS"[..]))
        .field("v", Codec::u8())
        .build()?;
    let record = Record::with_values(&def, [("v", 1u64)])?;
    assert_eq!(record.to_bytes()?, b"WS\x01");
    Ok(())
}

#[test]
fn ipv4_roundtrip() -> anyhow::Result<()> {
    let codec = Codec::ipv4();
    for addr in [Ipv4Addr::new(0, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 255)] {
        let v = Value::Ip(IpAddr::V4(addr));
        assert_eq!(roundtrip(&codec, &v)?, v);
    }
    assert_eq!(codec.to_bytes(&Value::from("192.168.1.10"))?, b"\xc0\xa8\x01\x0a");
    assert_eq!(codec.to_bytes(&Value::from(&b"\x7f\x00\x00\x01"[..]))?, b"\x7f\x00\x00\x01");
    Ok(())
}

#[test]
fn ipv6_roundtrip() -> anyhow::Result<()> {
    let codec = Codec::ipv6();
    let bytes = codec.to_bytes(&Value::from("::1"))?;
    assert_eq!(bytes.len(), 16);
    assert_eq!(bytes[15], 1);
    assert_eq!(codec.from_bytes(&bytes)?, Value::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    Ok(())
}

#[test]
fn ip_version_must_match() {
    let v6 = Value::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST));
    assert!(matches!(Codec::ipv4().to_bytes(&v6), Err(CodecError::TypeMismatch { .. })));
    assert!(matches!(Codec::ipv4().to_bytes(&Value::from("not an ip")), Err(CodecError::TypeMismatch { .. })));
    assert!(matches!(Codec::ipv4().to_bytes(&Value::from(&b"\x01\x02"[..])), Err(CodecError::ValueRange { .. })));
}

#[test]
fn mac_roundtrip_and_canonical_form() -> anyhow::Result<()> {
    let codec = Codec::mac();
    for mac in ["00:00:00:00:00:00", "ff:ff:ff:ff:ff:ff"] {
        assert_eq!(roundtrip(&codec, &Value::from(mac))?, Value::from(mac));
    }
    assert_eq!(
        roundtrip(&codec, &Value::from("AA-BB-CC-DD-EE-0F"))?,
        Value::from("aa:bb:cc:dd:ee:0f")
    );
    assert_eq!(codec.to_bytes(&Value::from("0011.2233.4455"))?, b"\x00\x11\x22\x33\x44\x55");
    assert!(matches!(codec.to_bytes(&Value::from("zz:00:00:00:00:00")), Err(CodecError::TypeMismatch { .. })));
    assert!(matches!(codec.to_bytes(&Value::from("00:00:00")), Err(CodecError::TypeMismatch { .. })));
    Ok(())
}

// ==================== Byte codecs ====================

#[test]
fn static_bytes_pads_and_strips() -> anyhow::Result<()> {
    let codec = Codec::static_bytes(4);
    let mut ctx = Context::new();
    let bytes = codec.encode(&mut ctx, &Value::from(&b"ab"[..]))?;
    assert_eq!(bytes, b"ab\x00\x00");
    assert_eq!(ctx.index, 4);
    assert_eq!(codec.from_bytes(&bytes)?, Value::Bytes(b"ab".to_vec()));
    assert!(matches!(codec.to_bytes(&Value::from("abcde")), Err(CodecError::ValueRange { .. })));
    Ok(())
}

#[test]
fn sized_bytes_prefix() -> anyhow::Result<()> {
    let codec = Codec::sized_bytes(8)?;
    let bytes = codec.to_bytes(&Value::from("hello"))?;
    assert_eq!(bytes, b"\x05hello");
    assert_eq!(codec.from_bytes(&bytes)?, Value::Bytes(b"hello".to_vec()));
    let too_long = Value::Bytes(vec![0; 256]);
    assert!(matches!(codec.to_bytes(&too_long), Err(CodecError::ValueRange { .. })));
    assert!(matches!(codec.from_bytes(b"\x05hel"), Err(CodecError::Truncated { offset: 1, .. })));
    Ok(())
}

#[test]
fn greedy_bytes_takes_the_rest() -> anyhow::Result<()> {
    let codec = Codec::greedy_bytes();
    for payload in [&b""[..], &b"\x00\x01rest"[..]] {
        let v = Value::from(payload);
        assert_eq!(roundtrip(&codec, &v)?, v);
    }
    let mut ctx = Context::new();
    ctx.index = 2;
    assert_eq!(codec.decode(&mut ctx, b"abcd")?, Value::Bytes(b"cd".to_vec()));
    assert_eq!(ctx.index, 4);
    Ok(())
}

// ==================== Lists ====================

#[test]
fn sized_list_fixture() -> anyhow::Result<()> {
    let codec = Codec::sized_list(16, Codec::u8())?;
    let bytes = codec.to_bytes(&ints(&[1, 2, 3]))?;
    assert_eq!(bytes, b"\x00\x03\x01\x02\x03");
    assert_eq!(codec.from_bytes(&bytes)?, ints(&[1, 2, 3]));
    assert_eq!(codec.to_string(), "sized_list(16, u8)");
    Ok(())
}

#[test]
fn static_list_requires_exact_length() -> anyhow::Result<()> {
    let codec = Codec::static_list(3, Codec::u16());
    assert_eq!(codec.sizeof()?, 6);
    assert_eq!(codec.to_bytes(&ints(&[1, 2, 3]))?, b"\x00\x01\x00\x02\x00\x03");
    assert!(matches!(codec.to_bytes(&ints(&[1, 2])), Err(CodecError::ValueRange { .. })));
    assert!(matches!(codec.to_bytes(&ints(&[1, 2, 3, 4])), Err(CodecError::ValueRange { .. })));
    assert!(matches!(
        Codec::static_list(2, Codec::domain()).sizeof(),
        Err(CodecError::NotFixedSize(_))
    ));
    Ok(())
}

#[test]
fn greedy_list_until_exhausted() -> anyhow::Result<()> {
    let codec = Codec::greedy_list(Codec::u16());
    assert_eq!(codec.from_bytes(b"\x00\x01\x00\x02")?, ints(&[1, 2]));
    assert_eq!(codec.from_bytes(b"")?, ints(&[]));

    let err = codec.from_bytes(b"\x00\x01\x00\x02\x00").unwrap_err();
    assert_eq!(err.field_path(), "[2]");
    assert!(matches!(err.root(), CodecError::Truncated { offset: 4, .. }));
    Ok(())
}

#[test]
fn greedy_list_of_empty_elements_is_malformed() {
    let codec = Codec::greedy_list(Codec::static_bytes(0));
    assert!(matches!(codec.from_bytes(b"\x01"), Err(CodecError::Malformed { .. })));
}

#[test]
fn counted_lists_of_empty_elements_are_malformed() -> anyhow::Result<()> {
    let empty = StructDef::builder("Empty").build()?;
    let counted: [(Codec, &[u8]); 3] = [
        (Codec::sized_list(16, Codec::static_bytes(0))?, b"\xff\xff"),
        (Codec::sized_list(16, Codec::record(empty))?, b"\xff\xff"),
        (Codec::sized_list(32, Codec::constant(&b""[..]))?, b"\xff\xff\xff\xff"),
    ];
    for (codec, prefix) in counted {
        let err = codec.from_bytes(prefix).unwrap_err();
        assert_eq!(err.field_path(), "", "{codec}");
        assert!(matches!(err, CodecError::Malformed { .. }), "{codec}");
    }

    let fixed = Codec::static_list(3, Codec::static_bytes(0));
    assert!(matches!(fixed.from_bytes(b""), Err(CodecError::Malformed { offset: 0, .. })));

    // an empty count never decodes an element
    assert_eq!(Codec::sized_list(16, Codec::static_bytes(0))?.from_bytes(b"\x00\x00")?, Value::List(vec![]));
    Ok(())
}

#[test]
fn list_elements_are_type_checked() {
    let codec = Codec::sized_list(8, Codec::u8()).expect("codec");
    let err = codec
        .to_bytes(&Value::List(vec![Value::Int(1), Value::from("x")]))
        .unwrap_err();
    assert_eq!(err.field_path(), "[1]");
    assert!(matches!(err.root(), CodecError::TypeMismatch { .. }));
    assert!(matches!(codec.to_bytes(&Value::Int(1)), Err(CodecError::TypeMismatch { .. })));
}

// ==================== Sizes ====================

#[test]
fn variable_codecs_have_no_sizeof() -> anyhow::Result<()> {
    let variable = [
        Codec::sized_bytes(16)?,
        Codec::greedy_bytes(),
        Codec::domain(),
        Codec::sized_list(8, Codec::u8())?,
        Codec::greedy_list(Codec::u8()),
    ];
    for codec in variable {
        assert!(matches!(codec.sizeof(), Err(CodecError::NotFixedSize(_))), "{codec}");
    }
    Ok(())
}

#[test]
fn fixed_codecs_write_exactly_sizeof() -> anyhow::Result<()> {
    let cases = [
        (Codec::constant(&b"AB"[..]), Value::from("AB")),
        (Codec::u8(), Value::Int(7)),
        (Codec::int(48)?, Value::Int(1)),
        (Codec::u64(), Value::Int(u64::MAX)),
        (Codec::ipv4(), Value::from("10.0.0.1")),
        (Codec::ipv6(), Value::from("fe80::1")),
        (Codec::mac(), Value::from("01:23:45:67:89:ab")),
        (Codec::static_bytes(8), Value::from("abc")),
        (Codec::static_list(2, Codec::u32()), ints(&[1, 2])),
    ];
    for (codec, v) in cases {
        let mut ctx = Context::new();
        ctx.index = 3;
        let bytes = codec.encode(&mut ctx, &v)?;
        assert_eq!(bytes.len(), codec.sizeof()?, "{codec}");
        assert_eq!(ctx.index, 3 + bytes.len(), "{codec}");
    }
    Ok(())
}
