//! Abstract Syntax Tree for the schema DSL.

/// Root of a parsed schema: enum tables and structs, in source order.
#[derive(Debug, Clone, Default)]
pub struct SchemaFile {
    pub enums: Vec<EnumSection>,
    pub structs: Vec<StructSection>,
}

#[derive(Debug, Clone)]
pub struct EnumSection {
    pub name: String,
    pub variants: Vec<(String, u64)>,
}

#[derive(Debug, Clone)]
pub struct StructSection {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub type_spec: TypeSpec,
    /// `as Enum` on an integer field.
    pub enum_cast: Option<String>,
    pub init: Option<FieldInit>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Const(Vec<u8>),
    Int(u64),
    Ipv4,
    Ipv6,
    Mac,
    SizedBytes(u64),
    StaticBytes(u64),
    GreedyBytes,
    Domain,
    UncompressedDomain,
    SizedList(u64, Box<TypeSpec>),
    StaticList(u64, Box<TypeSpec>),
    GreedyList(Box<TypeSpec>),
    StructRef(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldInit {
    Default(Literal),
    CountOf(String),
    LengthOf(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(u64),
    /// String literal after escape processing.
    Bytes(Vec<u8>),
}
