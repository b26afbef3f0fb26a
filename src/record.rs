//! Struct definitions and records: named, ordered fields backed by codecs.
//!
//! A [`StructDef`] is built once (with [`StructBuilder`] or from a
//! [schema](crate::schema::Schema)) and shared behind an `Arc`. A [`Record`] is one
//! instance of it. Encoding walks the fields in declaration order and concatenates
//! their encodings; decoding walks the same order and builds a new record.
//!
//! Computed fields (`count_of(..)`, `length_of(..)` or a function) are derived from the
//! other fields on every encode and cannot be set by the caller. On decode they hold
//! whatever was on the wire.
//!
//! ```
//! use wirestruct::{Codec, Context, Record, StructDef, Value};
//!
//! let def = StructDef::builder("Pair")
//!     .field("a", Codec::u8())
//!     .field("b", Codec::u16())
//!     .build()
//!     .unwrap();
//! let rec = Record::with_values(&def, [("a", 5u64), ("b", 300u64)]).unwrap();
//! let bytes = rec.encode(&mut Context::new()).unwrap();
//! assert_eq!(bytes, b"\x05\x01\x2c");
//! assert_eq!(def.decode(&mut Context::new(), &bytes).unwrap(), rec);
//! ```

use crate::codec::{Codec, CodecError};
use crate::context::Context;
use crate::dump;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

pub type ComputeFn = fn(&Record) -> Result<Value, CodecError>;

/// How an `init = false` field derives its value.
#[derive(Clone)]
pub enum Compute {
    /// Number of elements in a list field.
    CountOf(String),
    /// Byte length of a bytes or string field.
    LengthOf(String),
    With(ComputeFn),
}

impl fmt::Debug for Compute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compute::CountOf(name) => write!(f, "count_of({name})"),
            Compute::LengthOf(name) => write!(f, "length_of({name})"),
            Compute::With(_) => f.write_str("with(<fn>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub codec: Codec,
    pub default: Option<Value>,
    pub compute: Option<Compute>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, codec: Codec) -> Self {
        let default = codec.default_value();
        FieldDef {
            name: name.into(),
            codec,
            default,
            compute: None,
        }
    }

    /// Whether the caller supplies this field (it is not computed).
    pub fn is_init(&self) -> bool {
        self.compute.is_none()
    }
}

#[derive(Debug)]
pub struct StructDef {
    name: String,
    fields: Vec<FieldDef>,
}

pub struct StructBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl StructBuilder {
    pub fn field(self, name: impl Into<String>, codec: Codec) -> Self {
        self.push(FieldDef::new(name, codec))
    }

    pub fn field_with_default(self, name: impl Into<String>, codec: Codec, default: impl Into<Value>) -> Self {
        let mut field = FieldDef::new(name, codec);
        field.default = Some(default.into());
        self.push(field)
    }

    pub fn computed(self, name: impl Into<String>, codec: Codec, compute: Compute) -> Self {
        let mut field = FieldDef::new(name, codec);
        field.default = None;
        field.compute = Some(compute);
        self.push(field)
    }

    pub fn push(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Check the field list and freeze it.
    ///
    /// Fails on duplicate names, a greedy field that is not last, or a computed field
    /// referring to a field that does not exist or is itself computed.
    pub fn build(self) -> Result<Arc<StructDef>, CodecError> {
        let schema_err = |msg: String| CodecError::Schema(format!("struct {}: {msg}", self.name));
        for (i, f) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|g| g.name == f.name) {
                return Err(schema_err(format!("duplicate field `{}`", f.name)));
            }
            if f.codec.is_greedy() && i + 1 != self.fields.len() {
                return Err(schema_err(format!(
                    "greedy field `{}` ({}) must be the last field",
                    f.name, f.codec
                )));
            }
            if let Some(Compute::CountOf(target) | Compute::LengthOf(target)) = &f.compute {
                match self.fields.iter().find(|g| &g.name == target) {
                    Some(g) if g.is_init() => {}
                    Some(_) => {
                        return Err(schema_err(format!(
                            "`{}` is computed from `{target}`, which is itself computed",
                            f.name
                        )))
                    }
                    None => {
                        return Err(schema_err(format!(
                            "`{}` is computed from unknown field `{target}`",
                            f.name
                        )))
                    }
                }
            }
        }
        Ok(Arc::new(StructDef {
            name: self.name,
            fields: self.fields,
        }))
    }
}

impl StructDef {
    pub fn builder(name: impl Into<String>) -> StructBuilder {
        StructBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Sum of the field widths, when every field has a fixed width.
    pub fn sizeof(&self) -> Result<usize, CodecError> {
        self.fields
            .iter()
            .map(|f| f.codec.sizeof())
            .sum::<Result<usize, _>>()
            .map_err(|_| CodecError::NotFixedSize(self.name.clone()))
    }

    #[instrument(level = "trace", skip_all, fields(name = %self.name, offset = ctx.index))]
    pub fn decode(self: &Arc<Self>, ctx: &mut Context, raw: &[u8]) -> Result<Record, CodecError> {
        let start = ctx.index;
        let mut values = Vec::with_capacity(self.fields.len());
        for f in &self.fields {
            let v = f.codec.decode(ctx, raw).map_err(|e| e.in_field(&f.name))?;
            values.push(Some(v));
        }
        debug!(name = %self.name, bytes = ctx.index - start, end = ctx.index, "decoded struct");
        Ok(Record {
            def: Arc::clone(self),
            values,
        })
    }

    /// Decode a whole buffer holding exactly one record.
    pub fn parse_bytes(self: &Arc<Self>, raw: &[u8]) -> Result<Record, CodecError> {
        let mut ctx = Context::new();
        let record = self.decode(&mut ctx, raw)?;
        if !ctx.is_exhausted(raw) {
            return Err(CodecError::Malformed {
                offset: ctx.index,
                reason: format!("{} trailing bytes after {}", ctx.remaining(raw), self.name),
            });
        }
        Ok(record)
    }
}

/// One instance of a [`StructDef`].
#[derive(Debug, Clone)]
pub struct Record {
    def: Arc<StructDef>,
    values: Vec<Option<Value>>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.def.name == other.def.name && self.values == other.values
    }
}

impl Record {
    /// New record with every field at its default (or unset).
    pub fn new(def: &Arc<StructDef>) -> Self {
        Record {
            def: Arc::clone(def),
            values: def.fields.iter().map(|f| f.default.clone()).collect(),
        }
    }

    /// New record with the given fields set; the rest take their defaults.
    pub fn with_values<I, K, V>(def: &Arc<StructDef>, values: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Record::new(def);
        for (name, value) in values {
            record.set(name.as_ref(), value)?;
        }
        Ok(record)
    }

    pub fn def(&self) -> &Arc<StructDef> {
        &self.def
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.def.position(name).and_then(|i| self.values[i].as_ref())
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), CodecError> {
        let i = self
            .def
            .position(name)
            .ok_or_else(|| CodecError::UnknownField(format!("{}.{name}", self.def.name)))?;
        if !self.def.fields[i].is_init() {
            return Err(CodecError::ComputedField(name.to_string()));
        }
        self.values[i] = Some(value.into());
        Ok(())
    }

    /// Field names with their current values, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.def
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name.as_str(), v.as_ref()))
    }

    fn compute(&self, compute: &Compute) -> Result<Value, CodecError> {
        let target = |name: &str| self.get(name).ok_or_else(|| CodecError::MissingField(name.to_string()));
        match compute {
            Compute::CountOf(name) => {
                let v = target(name)?;
                let items = v.as_list().ok_or_else(|| CodecError::TypeMismatch {
                    codec: format!("count_of({name})"),
                    expected: "list",
                    found: v.kind(),
                })?;
                Ok(Value::Int(items.len() as u64))
            }
            Compute::LengthOf(name) => {
                let v = target(name)?;
                let bytes = v.as_bytes().ok_or_else(|| CodecError::TypeMismatch {
                    codec: format!("length_of({name})"),
                    expected: "bytes",
                    found: v.kind(),
                })?;
                Ok(Value::Int(bytes.len() as u64))
            }
            Compute::With(f) => f(self),
        }
    }

    pub fn encode(&self, ctx: &mut Context) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.encode_into(ctx, &mut out)?;
        Ok(out)
    }

    /// Encode with a fresh context.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        self.encode(&mut Context::new())
    }

    #[instrument(level = "trace", skip_all, fields(name = %self.def.name, offset = ctx.index))]
    pub fn encode_into(&self, ctx: &mut Context, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let start = ctx.index;
        for (f, stored) in self.def.fields.iter().zip(&self.values) {
            let computed;
            let v = match &f.compute {
                Some(c) => {
                    computed = self.compute(c).map_err(|e| e.in_field(&f.name))?;
                    &computed
                }
                None => stored
                    .as_ref()
                    .ok_or_else(|| CodecError::MissingField(f.name.clone()))?,
            };
            f.codec.encode_into(ctx, v, out).map_err(|e| e.in_field(&f.name))?;
        }
        debug!(name = %self.def.name, bytes = ctx.index - start, end = ctx.index, "encoded struct");
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dump::format_record(self))
    }
}
