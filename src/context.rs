//! Cursor state threaded through one encode or decode pass.
//!
//! A [`Context`] holds the current byte offset and the domain-name tables used by
//! [`domain`](crate::domain) compression. Offsets are only meaningful inside the buffer
//! being built or read, so use a fresh context (or [`Context::reset`]) per packet and
//! never share one between concurrent operations.

use crate::codec::CodecError;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Largest offset a 14-bit compression pointer can address.
pub const MAX_POINTER_OFFSET: usize = 0x3FFF;

#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Write cursor during encode, read cursor during decode.
    pub index: usize,
    index_to_domain: HashMap<usize, Vec<u8>>,
    domain_to_index: HashMap<Vec<u8>, usize>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `raw[index..index + length]` and advance the cursor past it.
    pub fn slice<'a>(&mut self, raw: &'a [u8], length: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .index
            .checked_add(length)
            .filter(|&end| end <= raw.len())
            .ok_or(CodecError::Truncated {
                offset: self.index,
                needed: length,
                available: raw.len().saturating_sub(self.index),
            })?;
        let out = &raw[self.index..end];
        self.index = end;
        Ok(out)
    }

    /// Bytes left in `raw` after the cursor.
    pub fn remaining(&self, raw: &[u8]) -> usize {
        raw.len().saturating_sub(self.index)
    }

    pub fn is_exhausted(&self, raw: &[u8]) -> bool {
        self.index >= raw.len()
    }

    pub(crate) fn advance(&mut self, n: usize) {
        self.index += n;
    }

    /// Record that `domain` starts at `offset`.
    ///
    /// Both tables keep the first mapping they see: a repeated name keeps pointing at
    /// its earliest occurrence. Names starting past [`MAX_POINTER_OFFSET`] are kept
    /// for offset lookup but never become pointer targets.
    pub fn save_domain(&mut self, domain: &[u8], offset: usize) {
        self.index_to_domain
            .entry(offset)
            .or_insert_with(|| domain.to_vec());
        if offset > MAX_POINTER_OFFSET {
            debug!(
                offset,
                domain = %String::from_utf8_lossy(domain),
                "domain suffix beyond pointer range, not registered for compression"
            );
            return;
        }
        if !self.domain_to_index.contains_key(domain) {
            trace!(offset, domain = %String::from_utf8_lossy(domain), "registered domain suffix");
            self.domain_to_index.insert(domain.to_vec(), offset);
        }
    }

    /// Domain previously recorded at `offset`.
    pub fn domain_at(&self, offset: usize) -> Option<&[u8]> {
        self.index_to_domain.get(&offset).map(Vec::as_slice)
    }

    /// Offset a pointer to `domain` should reference, if any.
    pub fn offset_of(&self, domain: &[u8]) -> Option<usize> {
        self.domain_to_index.get(domain).copied()
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.index_to_domain.clear();
        self.domain_to_index.clear();
    }
}
