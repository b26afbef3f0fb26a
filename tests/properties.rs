use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use wirestruct::{Codec, Context, Record, Schema, StructDef, Value};

const DNS_SCHEMA: &str = include_str!("../schemas/dns.schema");

fn mask_value(bits: u32, value: u64) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

fn int_strategy() -> impl Strategy<Value = (u32, u64)> {
    (1u32..=8, any::<u64>()).prop_map(|(bytes, value)| (bytes * 8, mask_value(bytes * 8, value)))
}

fn domain_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9]{1,12}", 1..5).prop_map(|labels| labels.join("."))
}

proptest! {
    #[test]
    fn prop_int_roundtrip((bits, value) in int_strategy()) {
        let codec = Codec::int(bits).unwrap();
        let mut ctx = Context::new();
        let bytes = codec.encode(&mut ctx, &Value::Int(value)).unwrap();
        prop_assert_eq!(bytes.len(), (bits / 8) as usize);
        prop_assert_eq!(ctx.index, bytes.len());
        prop_assert_eq!(codec.from_bytes(&bytes).unwrap(), Value::Int(value));
    }

    #[test]
    fn prop_int_out_of_range(bytes in 1u32..8, extra in 1u64..1000) {
        let codec = Codec::int(bytes * 8).unwrap();
        let too_big = mask_value(bytes * 8, u64::MAX) + extra;
        prop_assert!(codec.to_bytes(&Value::Int(too_big)).is_err());
    }

    #[test]
    fn prop_ip_roundtrip(v4 in any::<[u8; 4]>(), v6 in any::<[u8; 16]>()) {
        let a = Value::Ip(IpAddr::V4(Ipv4Addr::from(v4)));
        let b = Value::Ip(IpAddr::V6(Ipv6Addr::from(v6)));
        prop_assert_eq!(Codec::ipv4().from_bytes(&Codec::ipv4().to_bytes(&a).unwrap()).unwrap(), a);
        prop_assert_eq!(Codec::ipv6().from_bytes(&Codec::ipv6().to_bytes(&b).unwrap()).unwrap(), b);
    }

    #[test]
    fn prop_static_bytes_strip_trailing_zeros(data in prop::collection::vec(any::<u8>(), 0..16)) {
        let codec = Codec::static_bytes(16);
        let bytes = codec.to_bytes(&Value::Bytes(data.clone())).unwrap();
        prop_assert_eq!(bytes.len(), 16);
        let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        prop_assert_eq!(codec.from_bytes(&bytes).unwrap(), Value::Bytes(data[..end].to_vec()));
    }

    #[test]
    fn prop_sized_and_greedy_bytes_roundtrip(data in prop::collection::vec(any::<u8>(), 0..300)) {
        let sized = Codec::sized_bytes(16).unwrap();
        let v = Value::Bytes(data.clone());
        let bytes = sized.to_bytes(&v).unwrap();
        prop_assert_eq!(bytes.len(), data.len() + 2);
        prop_assert_eq!(sized.from_bytes(&bytes).unwrap(), v.clone());
        prop_assert_eq!(Codec::greedy_bytes().from_bytes(&data).unwrap(), v);
    }

    #[test]
    fn prop_domains_roundtrip_in_one_buffer(names in prop::collection::vec(domain_strategy(), 1..8)) {
        let codec = Codec::domain();
        let mut ctx = Context::new();
        let mut out = Vec::new();
        for n in &names {
            codec.encode_into(&mut ctx, &Value::from(n.as_str()), &mut out).unwrap();
        }
        prop_assert_eq!(ctx.index, out.len());

        let mut ctx = Context::new();
        for n in &names {
            prop_assert_eq!(codec.decode(&mut ctx, &out).unwrap(), Value::Bytes(n.as_bytes().to_vec()));
        }
        prop_assert!(ctx.is_exhausted(&out));
    }

    #[test]
    fn prop_compression_never_grows(names in prop::collection::vec(domain_strategy(), 1..8)) {
        let encode_all = |codec: Codec| {
            let mut ctx = Context::new();
            let mut out = Vec::new();
            for n in &names {
                codec.encode_into(&mut ctx, &Value::from(n.as_str()), &mut out).unwrap();
            }
            out
        };
        let compressed = encode_all(Codec::domain());
        let plain = encode_all(Codec::uncompressed_domain());
        prop_assert!(compressed.len() <= plain.len());
    }

    #[test]
    fn prop_struct_reencode_is_identical(
        id in any::<u16>(),
        host in domain_strategy(),
        tags in prop::collection::vec(any::<u8>(), 0..10),
        body in prop::collection::vec(any::<u8>(), 0..40),
    ) {
        let def = StructDef::builder("Packet")
            .field("id", Codec::u16())
            .field("host", Codec::domain())
            .field("alias", Codec::domain())
            .field("tags", Codec::sized_list(8, Codec::u8()).unwrap())
            .field("body", Codec::greedy_bytes())
            .build()
            .unwrap();
        let alias = format!("www.{host}");
        let record = Record::with_values(&def, [
            ("id", Value::Int(u64::from(id))),
            ("host", Value::from(host.as_str())),
            ("alias", Value::from(alias.as_str())),
            ("tags", Value::List(tags.iter().map(|&t| Value::Int(u64::from(t))).collect())),
            ("body", Value::Bytes(body)),
        ]).unwrap();
        let bytes = record.to_bytes().unwrap();
        let decoded = def.parse_bytes(&bytes).unwrap();
        prop_assert_eq!(decoded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn prop_decode_arbitrary_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..200)) {
        let schema = Schema::parse(DNS_SCHEMA).unwrap();
        let message = schema.get("Message").unwrap();
        if let Ok(record) = message.parse_bytes(&data) {
            let _ = record.to_bytes();
        }
        let _ = Codec::domain().from_bytes(&data);
        let _ = Codec::greedy_list(Codec::domain()).from_bytes(&data);
    }
}
