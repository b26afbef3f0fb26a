//! Runtime values for encoding/decoding (codec representation).

use crate::record::Record;
use std::net::IpAddr;

/// A single encoded or decoded field value.
///
/// Each codec accepts a small set of shapes; see [`Codec`](crate::Codec) for which.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(u64),
    /// Integer decoded through an [`EnumDef`] whose value has a known name.
    Enum { name: String, value: u64 },
    Bytes(Vec<u8>),
    Str(String),
    Ip(IpAddr),
    List(Vec<Value>),
    Struct(Record),
}

impl Value {
    /// Short shape name used in type-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Enum { .. } => "enum",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
            Value::Ip(IpAddr::V4(_)) => "ipv4 address",
            Value::Ip(IpAddr::V6(_)) => "ipv6 address",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Byte view of `Bytes` and `Str` values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Struct(r) => Some(r),
            _ => None,
        }
    }
}

impl From<u64> for Value {
    fn from(x: u64) -> Self {
        Value::Int(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<IpAddr> for Value {
    fn from(ip: IpAddr) -> Self {
        Value::Ip(ip)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Struct(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Named integer values attached to an integer codec (`int(16) as RecordType`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<(String, u64)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, variants: Vec<(String, u64)>) -> Self {
        EnumDef {
            name: name.into(),
            variants,
        }
    }

    pub fn name_of(&self, value: u64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<u64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Wrap a raw decoded integer: known values become [`Value::Enum`].
    pub fn wrap(&self, value: u64) -> Value {
        match self.name_of(value) {
            Some(name) => Value::Enum {
                name: name.to_string(),
                value,
            },
            None => Value::Int(value),
        }
    }
}
