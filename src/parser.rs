//! Parse schema DSL source into AST using PEST.

use crate::ast::*;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse schema source into AST. Names are not resolved here; see
/// [`Schema::resolve`](crate::schema::Schema::resolve).
pub fn parse(source: &str) -> Result<SchemaFile, String> {
    let pairs = SchemaParser::parse(Rule::schema, source).map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    let mut file = SchemaFile::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::enum_section => file.enums.push(build_enum(inner)?),
            Rule::struct_section => file.structs.push(build_struct(inner)?),
            _ => {}
        }
    }
    Ok(file)
}

fn build_enum(pair: Pair) -> Result<EnumSection, String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("enum section: missing name")?.as_str().to_string();
    let mut variants = Vec::new();
    for variant in it {
        let mut parts = variant.into_inner();
        let var_name = parts.next().ok_or("enum variant: name")?.as_str().to_string();
        let value = parse_number(parts.next().ok_or("enum variant: value")?.as_str())?;
        variants.push((var_name, value));
    }
    Ok(EnumSection { name, variants })
}

fn build_struct(pair: Pair) -> Result<StructSection, String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("struct section: missing name")?.as_str().to_string();
    let fields = it.map(build_field).collect::<Result<Vec<_>, _>>()?;
    Ok(StructSection { name, fields })
}

fn build_field(pair: Pair) -> Result<FieldDecl, String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("field: missing name")?.as_str().to_string();
    let type_spec = build_type_spec(it.next().ok_or("field: missing type")?)?;
    let mut enum_cast = None;
    let mut init = None;
    for inner in it {
        match inner.as_rule() {
            Rule::enum_cast => {
                let ident = inner.into_inner().next().ok_or("as: missing enum name")?;
                enum_cast = Some(ident.as_str().to_string());
            }
            Rule::field_init => init = Some(build_init(inner)?),
            other => return Err(format!("field {}: unexpected {:?}", name, other)),
        }
    }
    Ok(FieldDecl {
        name,
        type_spec,
        enum_cast,
        init,
    })
}

fn build_init(pair: Pair) -> Result<FieldInit, String> {
    let inner = pair.into_inner().next().ok_or("empty initialiser")?;
    let rule = inner.as_rule();
    let first = inner.into_inner().next().ok_or("initialiser: missing operand")?;
    match rule {
        Rule::count_of => Ok(FieldInit::CountOf(first.as_str().to_string())),
        Rule::length_of => Ok(FieldInit::LengthOf(first.as_str().to_string())),
        Rule::literal => Ok(FieldInit::Default(build_literal(first)?)),
        other => Err(format!("unexpected initialiser {:?}", other)),
    }
}

fn build_literal(pair: Pair) -> Result<Literal, String> {
    match pair.as_rule() {
        Rule::number => Ok(Literal::Int(parse_number(pair.as_str())?)),
        Rule::string => Ok(Literal::Bytes(string_bytes(pair)?)),
        other => Err(format!("unexpected literal {:?}", other)),
    }
}

fn build_type_spec(pair: Pair) -> Result<TypeSpec, String> {
    let inner = pair.into_inner().next().ok_or("Empty type_spec")?;
    let rule = inner.as_rule();
    if rule == Rule::keyword_type {
        return Ok(match inner.as_str() {
            "u8" => TypeSpec::Int(8),
            "u16" => TypeSpec::Int(16),
            "u32" => TypeSpec::Int(32),
            "u64" => TypeSpec::Int(64),
            "ipv4" => TypeSpec::Ipv4,
            "ipv6" => TypeSpec::Ipv6,
            "mac" => TypeSpec::Mac,
            "greedy_bytes" => TypeSpec::GreedyBytes,
            "domain" => TypeSpec::Domain,
            "uncompressed_domain" => TypeSpec::UncompressedDomain,
            other => return Err(format!("unknown type keyword {}", other)),
        });
    }
    let mut it = inner.into_inner();
    let mut next = |what: &str| it.next().ok_or_else(|| format!("{:?}: missing {}", rule, what));
    Ok(match rule {
        Rule::const_type => TypeSpec::Const(string_bytes(next("constant")?)?),
        Rule::int_type => TypeSpec::Int(parse_number(next("width")?.as_str())?),
        Rule::sized_bytes => TypeSpec::SizedBytes(parse_number(next("prefix width")?.as_str())?),
        Rule::static_bytes => TypeSpec::StaticBytes(parse_number(next("size")?.as_str())?),
        Rule::sized_list => {
            let bits = parse_number(next("prefix width")?.as_str())?;
            TypeSpec::SizedList(bits, Box::new(build_type_spec(next("element type")?)?))
        }
        Rule::static_list => {
            let n = parse_number(next("count")?.as_str())?;
            TypeSpec::StaticList(n, Box::new(build_type_spec(next("element type")?)?))
        }
        Rule::greedy_list => TypeSpec::GreedyList(Box::new(build_type_spec(next("element type")?)?)),
        Rule::struct_ref => TypeSpec::StructRef(next("name")?.as_str().to_string()),
        other => return Err(format!("unexpected type {:?}", other)),
    })
}

fn parse_number(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid number {}: {}", s, e))
}

/// Unescape the body of a `string` pair into raw bytes.
fn string_bytes(pair: Pair) -> Result<Vec<u8>, String> {
    let body = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    unescape(body)
}

pub(crate) fn unescape(body: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(body.len());
    let mut bytes = body.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let esc = bytes.next().ok_or("dangling escape at end of string")?;
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'0' => out.push(0),
            b'\\' => out.push(b'\\'),
            b'"' => out.push(b'"'),
            b'x' => {
                let hi = bytes.next().ok_or("\\x needs two hex digits")?;
                let lo = bytes.next().ok_or("\\x needs two hex digits")?;
                let hex = [hi, lo];
                let hex = std::str::from_utf8(&hex).map_err(|_| "\\x needs two hex digits")?;
                if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
                    return Err(format!("invalid escape \\x{}", hex));
                }
                out.push(u8::from_str_radix(hex, 16).map_err(|e| e.to_string())?);
            }
            other => return Err(format!("unknown escape \\{}", other as char)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_sequences() {
        assert_eq!(unescape(r#"\x00PROTO"#).unwrap(), b"\x00PROTO");
        assert_eq!(unescape(r#"a\"b\\c\n"#).unwrap(), b"a\"b\\c\n");
        assert!(unescape(r#"\xZZ"#).is_err());
        assert!(unescape(r#"\q"#).is_err());
        assert!(unescape("\\").is_err());
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("0x1F").unwrap(), 31);
        assert_eq!(parse_number("42").unwrap(), 42);
        assert!(parse_number("99999999999999999999999").is_err());
    }
}
