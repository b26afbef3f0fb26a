//! Field codecs: the encode/decode unit behind every struct field.
//!
//! Every codec works against a [`Context`] holding the absolute byte offset inside the
//! buffer being built or read. Encoding appends to an output buffer and advances
//! `ctx.index` by exactly the number of bytes written; decoding reads from `ctx.index`
//! and advances by the number of bytes consumed. All multi-byte integers are big-endian.
//!
//! | Codec | Accepts on encode | Decodes to | Fixed size |
//! |-------|-------------------|------------|------------|
//! | `const(..)` | bytes / string equal to the constant | bytes | length of constant |
//! | `int(n)` | int, enum, enum variant name | int or enum | n / 8 |
//! | `ipv4`, `ipv6` | address, string, packed bytes | address | 4 / 16 |
//! | `mac` | delimited hex string, 6 bytes | `xx:xx:xx:xx:xx:xx` string | 6 |
//! | `sized_bytes(n)` | bytes / string | bytes | no |
//! | `static_bytes(n)` | bytes / string up to n | bytes, trailing zeros stripped | n |
//! | `greedy_bytes` | bytes / string | bytes | no |
//! | `domain` | bytes / string | bytes | no |
//! | `sized_list(n, T)`, `greedy_list(T)` | list | list | no |
//! | `static_list(n, T)` | list of n | list | n * size of T |
//! | struct | record of that struct | record | sum of fields |
//!
//! Greedy codecs (`greedy_bytes`, `greedy_list`) read to the end of the buffer and must
//! be the last field of a struct; [`StructBuilder`](crate::record::StructBuilder) rejects
//! them anywhere else.

use crate::context::Context;
use crate::domain;
use crate::net::{self, IpVersion};
use crate::record::StructDef;
use crate::value::{EnumDef, Value};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("truncated input at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("malformed data at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    #[error("type mismatch: {codec} expects {expected}, got {found}")]
    TypeMismatch {
        codec: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("value out of range for {codec}: {reason}")]
    ValueRange { codec: String, reason: String },
    #[error("missing value for field `{0}`")]
    MissingField(String),
    #[error("{0} has no fixed size")]
    NotFixedSize(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("field `{0}` is computed from other fields and cannot be set")]
    ComputedField(String),
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<CodecError>,
    },
    #[error("schema: {0}")]
    Schema(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn in_field(self, field: impl Into<String>) -> Self {
        CodecError::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// The underlying error, with all field wrappers removed.
    pub fn root(&self) -> &CodecError {
        let mut e = self;
        while let CodecError::Field { source, .. } = e {
            e = source;
        }
        e
    }

    /// Path of the field the error came from, e.g. `answers[1].name`. Empty when the
    /// error was not raised inside a struct.
    pub fn field_path(&self) -> String {
        let mut path = String::new();
        let mut e = self;
        while let CodecError::Field { field, source } = e {
            if !path.is_empty() && !field.starts_with('[') {
                path.push('.');
            }
            path.push_str(field);
            e = source;
        }
        path
    }
}

/// Big-endian unsigned integer of 8 to 64 bits, optionally mapped through an enum table.
#[derive(Debug, Clone)]
pub struct IntCodec {
    bits: u32,
    enum_def: Option<Arc<EnumDef>>,
}

impl IntCodec {
    pub fn new(bits: u32) -> Result<Self, CodecError> {
        if bits == 0 || bits % 8 != 0 || bits > 64 {
            return Err(CodecError::Schema(format!(
                "int({bits}): width must be a multiple of 8 between 8 and 64"
            )));
        }
        Ok(IntCodec {
            bits,
            enum_def: None,
        })
    }

    const fn fixed(bits: u32) -> Self {
        IntCodec {
            bits,
            enum_def: None,
        }
    }

    /// Decode known values as [`Value::Enum`] and accept variant names on encode.
    pub fn with_enum(mut self, def: Arc<EnumDef>) -> Self {
        self.enum_def = Some(def);
        self
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn width(&self) -> usize {
        (self.bits / 8) as usize
    }

    pub fn enum_def(&self) -> Option<&EnumDef> {
        self.enum_def.as_deref()
    }

    pub fn max_value(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    pub(crate) fn write(&self, ctx: &mut Context, out: &mut Vec<u8>, v: u64) -> Result<(), CodecError> {
        if v > self.max_value() {
            return Err(CodecError::ValueRange {
                codec: format!("int({})", self.bits),
                reason: format!("{v} does not fit in {} bits", self.bits),
            });
        }
        let width = self.width();
        let mut buf = [0u8; 8];
        BigEndian::write_uint(&mut buf[..width], v, width);
        out.extend_from_slice(&buf[..width]);
        ctx.advance(width);
        Ok(())
    }

    pub(crate) fn read(&self, ctx: &mut Context, raw: &[u8]) -> Result<u64, CodecError> {
        let width = self.width();
        let bytes = ctx.slice(raw, width)?;
        Ok(BigEndian::read_uint(bytes, width))
    }

    fn raw_value(&self, v: &Value) -> Result<u64, CodecError> {
        match (v, &self.enum_def) {
            (Value::Int(x), _) => Ok(*x),
            (Value::Enum { value, .. }, _) => Ok(*value),
            (Value::Str(name), Some(def)) => def.value_of(name).ok_or_else(|| CodecError::ValueRange {
                codec: self.to_string(),
                reason: format!("`{name}` is not a variant of {}", def.name),
            }),
            (other, _) => Err(CodecError::TypeMismatch {
                codec: self.to_string(),
                expected: "int",
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Display for IntCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "int({})", self.bits)?;
        if let Some(def) = &self.enum_def {
            write!(f, " as {}", def.name)?;
        }
        Ok(())
    }
}

/// A field type: configuration only, all per-call state lives in [`Context`].
///
/// Codecs are immutable once built and can be shared freely between threads and
/// contexts.
#[derive(Debug, Clone)]
pub enum Codec {
    Const(Vec<u8>),
    Int(IntCodec),
    Ip(IpVersion),
    Mac,
    SizedBytes(IntCodec),
    StaticBytes(usize),
    GreedyBytes,
    Domain { compress: bool },
    SizedList(IntCodec, Box<Codec>),
    StaticList(usize, Box<Codec>),
    GreedyList(Box<Codec>),
    Struct(Arc<StructDef>),
}

impl Codec {
    pub fn constant(bytes: impl Into<Vec<u8>>) -> Self {
        Codec::Const(bytes.into())
    }

    pub fn int(bits: u32) -> Result<Self, CodecError> {
        IntCodec::new(bits).map(Codec::Int)
    }

    pub fn u8() -> Self {
        Codec::Int(IntCodec::fixed(8))
    }

    pub fn u16() -> Self {
        Codec::Int(IntCodec::fixed(16))
    }

    pub fn u32() -> Self {
        Codec::Int(IntCodec::fixed(32))
    }

    pub fn u64() -> Self {
        Codec::Int(IntCodec::fixed(64))
    }

    pub fn ipv4() -> Self {
        Codec::Ip(IpVersion::V4)
    }

    pub fn ipv6() -> Self {
        Codec::Ip(IpVersion::V6)
    }

    pub fn mac() -> Self {
        Codec::Mac
    }

    pub fn sized_bytes(prefix_bits: u32) -> Result<Self, CodecError> {
        IntCodec::new(prefix_bits).map(Codec::SizedBytes)
    }

    pub fn static_bytes(n: usize) -> Self {
        Codec::StaticBytes(n)
    }

    pub fn greedy_bytes() -> Self {
        Codec::GreedyBytes
    }

    pub fn domain() -> Self {
        Codec::Domain { compress: true }
    }

    /// Domain that is never written as a pointer, though later names may point into it.
    pub fn uncompressed_domain() -> Self {
        Codec::Domain { compress: false }
    }

    pub fn sized_list(prefix_bits: u32, inner: Codec) -> Result<Self, CodecError> {
        Ok(Codec::SizedList(IntCodec::new(prefix_bits)?, Box::new(inner)))
    }

    pub fn static_list(n: usize, inner: Codec) -> Self {
        Codec::StaticList(n, Box::new(inner))
    }

    pub fn greedy_list(inner: Codec) -> Self {
        Codec::GreedyList(Box::new(inner))
    }

    pub fn record(def: Arc<StructDef>) -> Self {
        Codec::Struct(def)
    }

    /// Encoded width in bytes, for codecs whose width does not depend on the value.
    pub fn sizeof(&self) -> Result<usize, CodecError> {
        match self {
            Codec::Const(c) => Ok(c.len()),
            Codec::Int(i) => Ok(i.width()),
            Codec::Ip(version) => Ok(version.width()),
            Codec::Mac => Ok(net::MAC_LEN),
            Codec::StaticBytes(n) => Ok(*n),
            Codec::StaticList(n, inner) => {
                let each = inner
                    .sizeof()
                    .map_err(|_| CodecError::NotFixedSize(self.to_string()))?;
                Ok(each * n)
            }
            Codec::Struct(def) => def.sizeof(),
            Codec::SizedBytes(_)
            | Codec::GreedyBytes
            | Codec::Domain { .. }
            | Codec::SizedList(..)
            | Codec::GreedyList(_) => Err(CodecError::NotFixedSize(self.to_string())),
        }
    }

    /// Whether this codec reads to the end of the buffer.
    pub fn is_greedy(&self) -> bool {
        match self {
            Codec::GreedyBytes | Codec::GreedyList(_) => true,
            Codec::StaticList(n, inner) => *n > 0 && inner.is_greedy(),
            Codec::Struct(def) => def.fields().last().is_some_and(|f| f.codec.is_greedy()),
            _ => false,
        }
    }

    /// Value a field of this type takes when none is supplied.
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Codec::Const(c) => Some(Value::Bytes(c.clone())),
            _ => None,
        }
    }

    pub fn encode(&self, ctx: &mut Context, v: &Value) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.encode_into(ctx, v, &mut out)?;
        Ok(out)
    }

    /// Encode `v` with a fresh context.
    pub fn to_bytes(&self, v: &Value) -> Result<Vec<u8>, CodecError> {
        self.encode(&mut Context::new(), v)
    }

    /// Decode one value from the start of `raw` with a fresh context.
    pub fn from_bytes(&self, raw: &[u8]) -> Result<Value, CodecError> {
        self.decode(&mut Context::new(), raw)
    }

    /// Append the encoding of `v` to `out`. Domain pointers are taken from `ctx`, so
    /// `ctx` must have encoded every earlier field of the same buffer.
    pub fn encode_into(&self, ctx: &mut Context, v: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match self {
            Codec::Const(expected) => {
                let got = self.bytes_of(v)?;
                if got != expected.as_slice() {
                    return Err(CodecError::Malformed {
                        offset: ctx.index,
                        reason: format!(
                            "constant {} cannot be written as {}",
                            escape_bytes(expected),
                            escape_bytes(got)
                        ),
                    });
                }
                out.extend_from_slice(expected);
                ctx.advance(expected.len());
                Ok(())
            }
            Codec::Int(i) => i.write(ctx, out, i.raw_value(v)?),
            Codec::Ip(version) => net::encode_ip(*version, ctx, v, out),
            Codec::Mac => net::encode_mac(ctx, v, out),
            Codec::SizedBytes(prefix) => {
                let bytes = self.bytes_of(v)?;
                prefix
                    .write(ctx, out, bytes.len() as u64)
                    .map_err(|_| self.too_long(bytes.len(), prefix.max_value()))?;
                out.extend_from_slice(bytes);
                ctx.advance(bytes.len());
                Ok(())
            }
            Codec::StaticBytes(n) => {
                let bytes = self.bytes_of(v)?;
                if bytes.len() > *n {
                    return Err(self.too_long(bytes.len(), *n as u64));
                }
                out.extend_from_slice(bytes);
                out.resize(out.len() + (n - bytes.len()), 0);
                ctx.advance(*n);
                Ok(())
            }
            Codec::GreedyBytes => {
                let bytes = self.bytes_of(v)?;
                out.extend_from_slice(bytes);
                ctx.advance(bytes.len());
                Ok(())
            }
            Codec::Domain { compress } => {
                let name = self.bytes_of(v)?;
                domain::encode(ctx, name, *compress, out)
            }
            Codec::SizedList(prefix, inner) => {
                let items = self.list_of(v)?;
                prefix
                    .write(ctx, out, items.len() as u64)
                    .map_err(|_| self.too_long(items.len(), prefix.max_value()))?;
                encode_items(inner, ctx, items, out)
            }
            Codec::StaticList(n, inner) => {
                let items = self.list_of(v)?;
                if items.len() != *n {
                    return Err(CodecError::ValueRange {
                        codec: self.to_string(),
                        reason: format!("expected exactly {n} elements, got {}", items.len()),
                    });
                }
                encode_items(inner, ctx, items, out)
            }
            Codec::GreedyList(inner) => {
                let items = self.list_of(v)?;
                encode_items(inner, ctx, items, out)
            }
            Codec::Struct(def) => match v {
                Value::Struct(record) if record.def().name() == def.name() => record.encode_into(ctx, out),
                Value::Struct(_) => Err(self.mismatch("record of another struct")),
                other => Err(self.mismatch(other.kind())),
            },
        }
    }

    pub fn decode(&self, ctx: &mut Context, raw: &[u8]) -> Result<Value, CodecError> {
        match self {
            Codec::Const(expected) => {
                let start = ctx.index;
                let got = ctx.slice(raw, expected.len())?;
                if got != expected.as_slice() {
                    return Err(CodecError::Malformed {
                        offset: start,
                        reason: format!(
                            "expected constant {}, found {}",
                            escape_bytes(expected),
                            escape_bytes(got)
                        ),
                    });
                }
                Ok(Value::Bytes(got.to_vec()))
            }
            Codec::Int(i) => {
                let raw_value = i.read(ctx, raw)?;
                Ok(match i.enum_def() {
                    Some(def) => def.wrap(raw_value),
                    None => Value::Int(raw_value),
                })
            }
            Codec::Ip(version) => net::decode_ip(*version, ctx, raw),
            Codec::Mac => net::decode_mac(ctx, raw),
            Codec::SizedBytes(prefix) => {
                let len = prefix.read(ctx, raw)?;
                let len = usize::try_from(len).map_err(|_| CodecError::Truncated {
                    offset: ctx.index,
                    needed: usize::MAX,
                    available: ctx.remaining(raw),
                })?;
                Ok(Value::Bytes(ctx.slice(raw, len)?.to_vec()))
            }
            Codec::StaticBytes(n) => {
                let bytes = ctx.slice(raw, *n)?;
                let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                Ok(Value::Bytes(bytes[..end].to_vec()))
            }
            Codec::GreedyBytes => {
                let rest = ctx.remaining(raw);
                Ok(Value::Bytes(ctx.slice(raw, rest)?.to_vec()))
            }
            Codec::Domain { .. } => domain::decode(ctx, raw).map(Value::Bytes),
            Codec::SizedList(prefix, inner) => {
                let count = prefix.read(ctx, raw)?;
                let count = usize::try_from(count).unwrap_or(usize::MAX);
                let mut items = Vec::with_capacity(count.min(ctx.remaining(raw)));
                for _ in 0..count {
                    items.push(self.decode_item(inner, ctx, raw, items.len())?);
                }
                Ok(Value::List(items))
            }
            Codec::StaticList(n, inner) => {
                let mut items = Vec::with_capacity((*n).min(ctx.remaining(raw)));
                for _ in 0..*n {
                    items.push(self.decode_item(inner, ctx, raw, items.len())?);
                }
                Ok(Value::List(items))
            }
            Codec::GreedyList(inner) => {
                let mut items = Vec::new();
                while !ctx.is_exhausted(raw) {
                    items.push(self.decode_item(inner, ctx, raw, items.len())?);
                }
                Ok(Value::List(items))
            }
            Codec::Struct(def) => def.decode(ctx, raw).map(Value::Struct),
        }
    }

    /// Decode list element `i`. Every element must consume at least one byte, so the
    /// element count can never outgrow the input.
    fn decode_item(&self, inner: &Codec, ctx: &mut Context, raw: &[u8], i: usize) -> Result<Value, CodecError> {
        let start = ctx.index;
        let item = inner.decode(ctx, raw).map_err(|e| e.in_field(format!("[{i}]")))?;
        if ctx.index == start {
            return Err(CodecError::Malformed {
                offset: start,
                reason: format!("{inner} consumed no bytes inside {self}"),
            });
        }
        Ok(item)
    }

    fn mismatch(&self, found: &'static str) -> CodecError {
        let expected = match self {
            Codec::Const(_) | Codec::SizedBytes(_) | Codec::StaticBytes(_) | Codec::GreedyBytes => "bytes",
            Codec::Domain { .. } => "domain name",
            Codec::Int(_) => "int",
            Codec::Ip(IpVersion::V4) => "ipv4 address",
            Codec::Ip(IpVersion::V6) => "ipv6 address",
            Codec::Mac => "mac address",
            Codec::SizedList(..) | Codec::StaticList(..) | Codec::GreedyList(_) => "list",
            Codec::Struct(_) => "struct",
        };
        CodecError::TypeMismatch {
            codec: self.to_string(),
            expected,
            found,
        }
    }

    fn bytes_of<'v>(&self, v: &'v Value) -> Result<&'v [u8], CodecError> {
        v.as_bytes().ok_or_else(|| self.mismatch(v.kind()))
    }

    fn list_of<'v>(&self, v: &'v Value) -> Result<&'v [Value], CodecError> {
        v.as_list().ok_or_else(|| self.mismatch(v.kind()))
    }

    fn too_long(&self, len: usize, max: u64) -> CodecError {
        CodecError::ValueRange {
            codec: self.to_string(),
            reason: format!("length {len} exceeds maximum {max}"),
        }
    }
}

fn encode_items(inner: &Codec, ctx: &mut Context, items: &[Value], out: &mut Vec<u8>) -> Result<(), CodecError> {
    for (i, item) in items.iter().enumerate() {
        inner
            .encode_into(ctx, item, out)
            .map_err(|e| e.in_field(format!("[{i}]")))?;
    }
    Ok(())
}

/// Render bytes as a DSL string literal body (`\xNN` for non-printable bytes).
pub(crate) fn escape_bytes(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() + 2);
    s.push('"');
    for &b in bytes {
        match b {
            b'"' => s.push_str("\\\""),
            b'\\' => s.push_str("\\\\"),
            0x20..=0x7e => s.push(b as char),
            _ => s.push_str(&format!("\\x{b:02x}")),
        }
    }
    s.push('"');
    s
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Const(c) => write!(f, "const({})", escape_bytes(c)),
            Codec::Int(i) => match (i.bits, &i.enum_def) {
                (8 | 16 | 32 | 64, None) => write!(f, "u{}", i.bits),
                _ => write!(f, "{i}"),
            },
            Codec::Ip(IpVersion::V4) => write!(f, "ipv4"),
            Codec::Ip(IpVersion::V6) => write!(f, "ipv6"),
            Codec::Mac => write!(f, "mac"),
            Codec::SizedBytes(prefix) => write!(f, "sized_bytes({})", prefix.bits),
            Codec::StaticBytes(n) => write!(f, "static_bytes({n})"),
            Codec::GreedyBytes => write!(f, "greedy_bytes"),
            Codec::Domain { compress: true } => write!(f, "domain"),
            Codec::Domain { compress: false } => write!(f, "uncompressed_domain"),
            Codec::SizedList(prefix, inner) => write!(f, "sized_list({}, {inner})", prefix.bits),
            Codec::StaticList(n, inner) => write!(f, "static_list({n}, {inner})"),
            Codec::GreedyList(inner) => write!(f, "greedy_list({inner})"),
            Codec::Struct(def) => write!(f, "{}", def.name()),
        }
    }
}
