//! DNS-style domain names with back-reference compression (RFC 1035 §4.1.4).
//!
//! A name is written as length-prefixed labels ending in a zero byte. Once a name (or a
//! suffix of one) has been written, later occurrences are replaced by a two-byte pointer
//! whose top two bits are `11` and whose low 14 bits hold the offset of the earlier copy.
//! Both directions keep the suffix tables of the [`Context`] up to date, so a context
//! shared by all fields of one packet resolves pointers between them.

use crate::codec::CodecError;
use crate::context::{Context, MAX_POINTER_OFFSET};
use byteorder::{BigEndian, WriteBytesExt};
use tracing::trace;

const POINTER_MASK: u8 = 0xC0;
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// Strip one trailing dot and check label lengths.
fn validate(name: &[u8]) -> Result<&[u8], CodecError> {
    let name = name.strip_suffix(b".").unwrap_or(name);
    if name.is_empty() {
        return Ok(name);
    }
    let range_err = |reason: String| CodecError::ValueRange {
        codec: "domain".to_string(),
        reason,
    };
    // Wire length: one length byte per label plus the label bytes plus the root byte.
    if name.len() + 2 > MAX_NAME_LEN {
        return Err(range_err(format!(
            "name of {} bytes exceeds {MAX_NAME_LEN} bytes on the wire",
            name.len()
        )));
    }
    for label in name.split(|&b| b == b'.') {
        if label.is_empty() {
            return Err(range_err(format!(
                "empty label in `{}`",
                String::from_utf8_lossy(name)
            )));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(range_err(format!(
                "label of {} bytes exceeds {MAX_LABEL_LEN}",
                label.len()
            )));
        }
    }
    Ok(name)
}

pub(crate) fn encode(ctx: &mut Context, name: &[u8], compress: bool, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let mut rest = validate(name)?;
    while !rest.is_empty() {
        if compress {
            if let Some(offset) = ctx.offset_of(rest) {
                debug_assert!(offset <= MAX_POINTER_OFFSET);
                let pointer = ((POINTER_MASK as u16) << 8) | offset as u16;
                out.write_u16::<BigEndian>(pointer)?;
                trace!(at = ctx.index, target = offset, "wrote domain pointer");
                ctx.advance(2);
                return Ok(());
            }
        }
        ctx.save_domain(rest, ctx.index);
        let (label, tail) = match rest.iter().position(|&b| b == b'.') {
            Some(dot) => (&rest[..dot], &rest[dot + 1..]),
            None => (rest, &[][..]),
        };
        out.push(label.len() as u8);
        out.extend_from_slice(label);
        ctx.advance(1 + label.len());
        rest = tail;
    }
    out.push(0);
    ctx.advance(1);
    Ok(())
}

fn join(parts: &[(usize, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, (_, part)) in parts.iter().enumerate() {
        if i > 0 {
            out.push(b'.');
        }
        out.extend_from_slice(part);
    }
    out
}

pub(crate) fn decode(ctx: &mut Context, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
    // (offset where the component starts, component bytes)
    let mut parts: Vec<(usize, Vec<u8>)> = Vec::new();
    // Wire length of the name so far, root byte excluded.
    let mut wire = 0usize;
    let too_long = |offset: usize, wire: usize| CodecError::Malformed {
        offset,
        reason: format!("name of {wire} bytes exceeds {MAX_NAME_LEN} bytes on the wire"),
    };
    loop {
        let start = ctx.index;
        let len = ctx.slice(raw, 1)?[0];
        if len == 0 {
            break;
        }
        if len & POINTER_MASK == POINTER_MASK {
            let low = ctx.slice(raw, 1)?[0];
            let target = (usize::from(len & !POINTER_MASK) << 8) | usize::from(low);
            let resolved = ctx.domain_at(target).ok_or_else(|| CodecError::Malformed {
                offset: start,
                reason: format!("pointer to offset {target} does not reference a known domain"),
            })?;
            // A recorded suffix is never empty, so its wire form is its text plus
            // the first length byte and the root byte.
            wire += resolved.len() + 2;
            if wire > MAX_NAME_LEN {
                return Err(too_long(start, wire));
            }
            trace!(at = start, target, "resolved domain pointer");
            parts.push((start, resolved.to_vec()));
            break;
        }
        if len & POINTER_MASK != 0 {
            return Err(CodecError::Malformed {
                offset: start,
                reason: format!("unsupported label type {:#04x}", len & POINTER_MASK),
            });
        }
        let label = ctx.slice(raw, usize::from(len))?;
        if label.contains(&b'.') {
            return Err(CodecError::Malformed {
                offset: start,
                reason: format!("label {:?} contains a dot", String::from_utf8_lossy(label)),
            });
        }
        wire += 1 + label.len();
        if wire + 1 > MAX_NAME_LEN {
            return Err(too_long(start, wire + 1));
        }
        parts.push((start, label.to_vec()));
    }
    for i in 0..parts.len() {
        let suffix = join(&parts[i..]);
        ctx.save_domain(&suffix, parts[i].0);
    }
    Ok(join(&parts))
}
