//! Resolve a parsed schema into codecs and struct definitions.
//!
//! ```text
//! enum RecordType { A = 1; NS = 2; CNAME = 5; }
//!
//! struct Question {
//!     name: domain;
//!     qtype: u16 as RecordType;
//!     qclass: u16 = 1;
//! }
//! ```
//!
//! Structs may only reference enums and structs declared above them, which rules out
//! recursive layouts.

use crate::ast::{FieldInit, Literal, SchemaFile, TypeSpec};
use crate::codec::{Codec, CodecError, IntCodec};
use crate::parser;
use crate::record::{Compute, FieldDef, StructDef};
use crate::value::{EnumDef, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Resolved schema: every struct and enum by name, plus declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    structs: HashMap<String, Arc<StructDef>>,
    enums: HashMap<String, Arc<EnumDef>>,
    order: Vec<String>,
}

impl Schema {
    /// Parse and resolve schema source.
    pub fn parse(source: &str) -> Result<Self, CodecError> {
        let file = parser::parse(source).map_err(CodecError::Schema)?;
        Self::resolve(file)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&source)
    }

    pub fn resolve(file: SchemaFile) -> Result<Self, CodecError> {
        let mut schema = Schema::default();
        for e in file.enums {
            if schema.enums.contains_key(&e.name) {
                return Err(CodecError::Schema(format!("duplicate enum {}", e.name)));
            }
            for (i, (name, _)) in e.variants.iter().enumerate() {
                if e.variants[..i].iter().any(|(n, _)| n == name) {
                    return Err(CodecError::Schema(format!("enum {}: duplicate variant {name}", e.name)));
                }
            }
            schema
                .enums
                .insert(e.name.clone(), Arc::new(EnumDef::new(e.name, e.variants)));
        }
        for s in file.structs {
            if schema.structs.contains_key(&s.name) {
                return Err(CodecError::Schema(format!("duplicate struct {}", s.name)));
            }
            let mut builder = StructDef::builder(s.name.clone());
            for f in s.fields {
                let in_field = |e: CodecError| e.in_field(format!("{}.{}", s.name, f.name));
                let mut codec = schema.codec_for(&f.type_spec).map_err(in_field)?;
                if let Some(enum_name) = &f.enum_cast {
                    codec = schema.cast(codec, enum_name).map_err(in_field)?;
                }
                let mut field = FieldDef::new(f.name.clone(), codec);
                match f.init {
                    Some(FieldInit::Default(lit)) => field.default = Some(literal_value(lit)),
                    Some(FieldInit::CountOf(target)) => {
                        field.default = None;
                        field.compute = Some(Compute::CountOf(target));
                    }
                    Some(FieldInit::LengthOf(target)) => {
                        field.default = None;
                        field.compute = Some(Compute::LengthOf(target));
                    }
                    None => {}
                }
                builder = builder.push(field);
            }
            let def = builder.build()?;
            debug!(name = %s.name, fields = def.fields().len(), "resolved struct");
            schema.order.push(s.name.clone());
            schema.structs.insert(s.name, def);
        }
        Ok(schema)
    }

    fn codec_for(&self, spec: &TypeSpec) -> Result<Codec, CodecError> {
        Ok(match spec {
            TypeSpec::Const(bytes) => Codec::constant(bytes.clone()),
            TypeSpec::Int(bits) => Codec::int(width(*bits)?)?,
            TypeSpec::Ipv4 => Codec::ipv4(),
            TypeSpec::Ipv6 => Codec::ipv6(),
            TypeSpec::Mac => Codec::mac(),
            TypeSpec::SizedBytes(bits) => Codec::sized_bytes(width(*bits)?)?,
            TypeSpec::StaticBytes(n) => Codec::static_bytes(count(*n)?),
            TypeSpec::GreedyBytes => Codec::greedy_bytes(),
            TypeSpec::Domain => Codec::domain(),
            TypeSpec::UncompressedDomain => Codec::uncompressed_domain(),
            TypeSpec::SizedList(bits, inner) => Codec::sized_list(width(*bits)?, self.codec_for(inner)?)?,
            TypeSpec::StaticList(n, inner) => Codec::static_list(count(*n)?, self.codec_for(inner)?),
            TypeSpec::GreedyList(inner) => Codec::greedy_list(self.codec_for(inner)?),
            TypeSpec::StructRef(name) => {
                let def = self
                    .structs
                    .get(name)
                    .ok_or_else(|| CodecError::Schema(format!("unknown struct {name} (structs must be declared before use)")))?;
                Codec::record(Arc::clone(def))
            }
        })
    }

    fn cast(&self, codec: Codec, enum_name: &str) -> Result<Codec, CodecError> {
        let def = self
            .enums
            .get(enum_name)
            .ok_or_else(|| CodecError::Schema(format!("unknown enum {enum_name}")))?;
        match codec {
            Codec::Int(int) => Ok(Codec::Int(int.with_enum(Arc::clone(def)))),
            other => Err(CodecError::Schema(format!("`as {enum_name}` needs an integer type, not {other}"))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<StructDef>> {
        self.structs.get(name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&Arc<EnumDef>> {
        self.enums.get(name)
    }

    /// Struct definitions in declaration order.
    pub fn structs(&self) -> impl Iterator<Item = &Arc<StructDef>> {
        self.order.iter().filter_map(|name| self.structs.get(name))
    }

    /// Integer codec for an enum table, e.g. to build fields by hand.
    pub fn enum_codec(&self, name: &str, bits: u32) -> Result<Codec, CodecError> {
        let def = self
            .enums
            .get(name)
            .ok_or_else(|| CodecError::Schema(format!("unknown enum {name}")))?;
        Ok(Codec::Int(IntCodec::new(bits)?.with_enum(Arc::clone(def))))
    }
}

fn width(bits: u64) -> Result<u32, CodecError> {
    u32::try_from(bits).map_err(|_| CodecError::Schema(format!("width {bits} is too large")))
}

fn count(n: u64) -> Result<usize, CodecError> {
    usize::try_from(n).map_err(|_| CodecError::Schema(format!("size {n} is too large")))
}

/// String literals become text when they are valid UTF-8.
fn literal_value(lit: Literal) -> Value {
    match lit {
        Literal::Int(x) => Value::Int(x),
        Literal::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::Str(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
    }
}
