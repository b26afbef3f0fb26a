//! Format decoded values for display (dump text, tree view).

use crate::record::Record;
use crate::value::Value;
use std::fmt::{self, Write};

const INDENT: &str = "  ";

/// Bytes as text when they are printable ASCII, otherwise as hex.
pub fn format_bytes(bytes: &[u8]) -> String {
    if !bytes.is_empty() && bytes.iter().all(|b| (0x20..0x7f).contains(b)) {
        format!("{:?}", String::from_utf8_lossy(bytes))
    } else {
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!("0x{hex}")
    }
}

/// Single-line rendering of scalars; lists and structs are summarised.
pub fn format_scalar(v: &Value) -> String {
    match v {
        Value::Int(x) => x.to_string(),
        Value::Enum { name, value } => format!("{name}({value})"),
        Value::Bytes(b) => format_bytes(b),
        Value::Str(s) => format!("{s:?}"),
        Value::Ip(ip) => ip.to_string(),
        Value::List(items) => format!("[{} items]", items.len()),
        Value::Struct(r) => format!("{} {{..}}", r.def().name()),
    }
}

fn write_value(out: &mut String, v: &Value, depth: usize) -> fmt::Result {
    match v {
        Value::List(items) if !items.is_empty() => {
            out.push('[');
            for item in items {
                out.push('\n');
                out.push_str(&INDENT.repeat(depth + 1));
                write_value(out, item, depth + 1)?;
            }
            out.push('\n');
            out.push_str(&INDENT.repeat(depth));
            out.push(']');
            Ok(())
        }
        Value::List(_) => {
            out.push_str("[]");
            Ok(())
        }
        Value::Struct(r) => write_record(out, r, depth),
        other => write!(out, "{}", format_scalar(other)),
    }
}

fn write_record(out: &mut String, r: &Record, depth: usize) -> fmt::Result {
    write!(out, "{} {{", r.def().name())?;
    for (name, v) in r.iter() {
        out.push('\n');
        out.push_str(&INDENT.repeat(depth + 1));
        write!(out, "{name}: ")?;
        match v {
            Some(v) => write_value(out, v, depth + 1)?,
            None => out.push_str("<unset>"),
        }
    }
    out.push('\n');
    out.push_str(&INDENT.repeat(depth));
    out.push('}');
    Ok(())
}

/// Indented tree of a value; lists and structs span several lines.
pub fn format_value(v: &Value) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_value(&mut out, v, 0);
    out
}

pub fn format_record(r: &Record) -> String {
    let mut out = String::new();
    let _ = write_record(&mut out, r, 0);
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}
