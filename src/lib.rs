//! # wirestruct: declarative binary structs and codecs
//!
//! Composable codecs that turn typed values into bytes and back, and a struct builder
//! that lays named fields out in declaration order. The wire format is byte-exact and
//! big-endian, with DNS-style domain name compression (RFC 1035 §4.1.4), so records can
//! describe real protocol packets.
//!
//! ## Pieces
//!
//! - [`Context`]: cursor and domain-pointer tables for one encode or decode pass
//! - [`Codec`]: one field type (`int(16)`, `domain`, `sized_list(8, ..)`, ...)
//! - [`StructDef`] / [`Record`]: an ordered set of named fields and one instance of it
//! - [`Schema`]: struct and enum definitions loaded from DSL text
//!
//! ## Schema DSL
//!
//! ```text
//! enum RecordType { A = 1; NS = 2; CNAME = 5; }
//!
//! struct Question {
//!     name: domain;
//!     qtype: u16 as RecordType;
//!     qclass: u16 = 1;
//! }
//!
//! struct Query {
//!     id: u16;
//!     qdcount: u16 = count_of(questions);
//!     questions: static_list(2, Question);
//! }
//! ```
//!
//! ## Usage
//!
//! ```
//! use wirestruct::{Codec, Context, Value};
//!
//! let mut ctx = Context::new();
//! let mut out = Vec::new();
//! Codec::domain().encode_into(&mut ctx, &Value::from("www.example.com"), &mut out).unwrap();
//! Codec::domain().encode_into(&mut ctx, &Value::from("mail.example.com"), &mut out).unwrap();
//! // the second name ends in a pointer to "example.com" at offset 4
//! assert_eq!(&out[17..], b"\x04mail\xc0\x04");
//!
//! let mut ctx = Context::new();
//! let first = Codec::domain().decode(&mut ctx, &out).unwrap();
//! let second = Codec::domain().decode(&mut ctx, &out).unwrap();
//! assert_eq!(first, Value::Bytes(b"www.example.com".to_vec()));
//! assert_eq!(second, Value::Bytes(b"mail.example.com".to_vec()));
//! ```
//!
//! A [`Context`] belongs to one buffer and one thread at a time. Codecs and struct
//! definitions are immutable and can be shared freely.

pub mod ast;
pub mod codec;
pub mod context;
pub mod domain;
pub mod dump;
pub mod net;
pub mod parser;
pub mod record;
pub mod schema;
pub mod value;

pub use ast::SchemaFile;
pub use codec::{Codec, CodecError, IntCodec};
pub use context::{Context, MAX_POINTER_OFFSET};
pub use net::IpVersion;
pub use parser::parse;
pub use record::{Compute, FieldDef, Record, StructBuilder, StructDef};
pub use schema::Schema;
pub use value::{EnumDef, Value};
