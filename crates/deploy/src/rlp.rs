//! RLP list builder for the few shapes contract creation needs: byte strings, unsigned
//! integers, empty lists and flat lists of those.

use alloy_core::rlp::{Encodable, Header};

/// Builder for an RLP list.
///
/// Items are appended in order, `finish` wraps the accumulated payload in a list header.
#[derive(Debug, Clone, Default)]
pub struct RlpList {
    payload: Vec<u8>,
}

impl RlpList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a byte string.
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        bytes.encode(&mut self.payload);
        self
    }

    /// Append an unsigned integer using the canonical encoding (zero is the empty string).
    pub fn uint(mut self, value: impl Into<u128>) -> Self {
        let value: u128 = value.into();
        value.encode(&mut self.payload);
        self
    }

    /// Append a big-endian unsigned integer of arbitrary width, stripping leading zeros.
    pub fn uint_be(self, be: &[u8]) -> Self {
        let first = be.iter().position(|b| *b != 0).unwrap_or(be.len());
        self.bytes(&be[first..])
    }

    /// Append an empty list, as an access list with no entries.
    pub fn empty_list(mut self) -> Self {
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(&mut self.payload);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 9);
        Header {
            list: true,
            payload_length: self.payload.len(),
        }
        .encode(&mut out);
        out.extend_from_slice(&self.payload);
        out
    }
}
