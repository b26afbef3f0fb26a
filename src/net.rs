//! IP and MAC address codecs.

use crate::codec::CodecError;
use crate::context::Context;
use crate::value::Value;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub const MAC_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn width(self) -> usize {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 16,
        }
    }

    fn codec_name(self) -> &'static str {
        match self {
            IpVersion::V4 => "ipv4",
            IpVersion::V6 => "ipv6",
        }
    }

    fn expected(self) -> &'static str {
        match self {
            IpVersion::V4 => "ipv4 address",
            IpVersion::V6 => "ipv6 address",
        }
    }
}

fn mismatch(codec: &str, expected: &'static str, found: &'static str) -> CodecError {
    CodecError::TypeMismatch {
        codec: codec.to_string(),
        expected,
        found,
    }
}

/// Packed form of an address given as an address, a textual address or packed bytes.
fn pack_ip(version: IpVersion, v: &Value) -> Result<Vec<u8>, CodecError> {
    let name = version.codec_name();
    let addr = match v {
        Value::Ip(addr) => *addr,
        Value::Str(s) => s
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| mismatch(name, version.expected(), "unparsable address string"))?,
        Value::Bytes(b) if b.len() == version.width() => return Ok(b.clone()),
        Value::Bytes(b) => {
            return Err(CodecError::ValueRange {
                codec: name.to_string(),
                reason: format!("packed address must be {} bytes, got {}", version.width(), b.len()),
            })
        }
        other => return Err(mismatch(name, version.expected(), other.kind())),
    };
    match (version, addr) {
        (IpVersion::V4, IpAddr::V4(a)) => Ok(a.octets().to_vec()),
        (IpVersion::V6, IpAddr::V6(a)) => Ok(a.octets().to_vec()),
        (_, other) => Err(mismatch(name, version.expected(), Value::Ip(other).kind())),
    }
}

pub(crate) fn encode_ip(version: IpVersion, ctx: &mut Context, v: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let packed = pack_ip(version, v)?;
    out.extend_from_slice(&packed);
    ctx.advance(packed.len());
    Ok(())
}

pub(crate) fn decode_ip(version: IpVersion, ctx: &mut Context, raw: &[u8]) -> Result<Value, CodecError> {
    let bytes = ctx.slice(raw, version.width())?;
    let addr = match version {
        IpVersion::V4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(bytes);
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        IpVersion::V6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    };
    Ok(Value::Ip(addr))
}

/// Parse `aa:bb:cc:dd:ee:ff`, `aa-bb-..`, `aabb.ccdd.eeff` or bare hex into six bytes.
pub fn parse_mac(s: &str) -> Option<[u8; MAC_LEN]> {
    let text = s.trim().as_bytes();
    let digits: Vec<u8> = match text.len() {
        12 => text.to_vec(),
        // aa:bb:cc:dd:ee:ff or aa-bb-cc-dd-ee-ff
        17 => {
            let sep = text[2];
            if !matches!(sep, b':' | b'-') || !(2..17).step_by(3).all(|i| text[i] == sep) {
                return None;
            }
            text.chunks(3).flat_map(|group| &group[..2]).copied().collect()
        }
        // aabb.ccdd.eeff
        14 => {
            if text[4] != b'.' || text[9] != b'.' {
                return None;
            }
            text.chunks(5).flat_map(|group| &group[..4]).copied().collect()
        }
        _ => return None,
    };
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let mut out = [0u8; MAC_LEN];
    for (i, pair) in digits.chunks(2).enumerate() {
        let hex = std::str::from_utf8(pair).ok()?;
        out[i] = u8::from_str_radix(hex, 16).ok()?;
    }
    Some(out)
}

pub fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

pub(crate) fn encode_mac(ctx: &mut Context, v: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let packed = match v {
        Value::Str(s) => parse_mac(s).ok_or_else(|| mismatch("mac", "mac address", "unparsable mac string"))?,
        Value::Bytes(b) if b.len() == MAC_LEN => {
            let mut out = [0u8; MAC_LEN];
            out.copy_from_slice(b);
            out
        }
        Value::Bytes(b) => {
            return Err(CodecError::ValueRange {
                codec: "mac".to_string(),
                reason: format!("packed address must be {MAC_LEN} bytes, got {}", b.len()),
            })
        }
        other => return Err(mismatch("mac", "mac address", other.kind())),
    };
    out.extend_from_slice(&packed);
    ctx.advance(MAC_LEN);
    Ok(())
}

pub(crate) fn decode_mac(ctx: &mut Context, raw: &[u8]) -> Result<Value, CodecError> {
    let bytes = ctx.slice(raw, MAC_LEN)?;
    Ok(Value::Str(format_mac(bytes)))
}
