// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Value contract for slots of the wait-free map.
//!
//! Slot blobs are laid out as `i32 write_sequence` (big endian) followed by
//! the value's own payload. The map owns the header; values only encode and
//! decode their payload.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{BoxedDecodeError, StoreError};

/// Byte length of the write-sequence header at the front of every blob.
pub const BLOB_HEADER_LEN: usize = 4;

/// A value type that can live in a [`WaitFreeMap`](crate::WaitFreeMap).
///
/// The merge function is what makes concurrent writes safe: when a writer's
/// value was derived from a slot version other than the one currently stored,
/// the map calls [`merge`](WaitFreeValue::merge) instead of overwriting.
/// Implementations must be commutative and idempotent over their content so
/// that retries converge.
pub trait WaitFreeValue: Clone + Send + Sync {
    /// Decode failure type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write-sequence token of the slot version this value was read from
    /// (or [`NO_WRITE_SEQUENCE`](crate::NO_WRITE_SEQUENCE) for fresh values).
    fn write_sequence(&self) -> i32;

    /// Record the token under which this value is being stored.
    fn set_write_sequence(&mut self, write_sequence: i32);

    /// Append the payload bytes (without the header).
    fn encode(&self, buf: &mut BytesMut);

    /// Rebuild a value from its payload bytes.
    fn decode(payload: &[u8], write_sequence: i32) -> Result<Self, Self::Error>;

    /// Combine `self` (the incoming write) with the value currently stored.
    fn merge(self, existing: Self, existing_write_sequence: i32) -> Self;
}

/// Encode `value` with its write-sequence header.
pub fn encode_blob<V: WaitFreeValue>(value: &V) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_i32(value.write_sequence());
    value.encode(&mut buf);
    buf.to_vec()
}

/// Read the write-sequence token of a stored blob.
pub fn blob_write_sequence(sequence: usize, blob: &[u8]) -> Result<i32, StoreError> {
    if blob.len() < BLOB_HEADER_LEN {
        return Err(StoreError::ShortBlob {
            sequence,
            len: blob.len(),
        });
    }
    let mut header = &blob[..BLOB_HEADER_LEN];
    Ok(header.get_i32())
}

/// Decode a stored blob into a value.
pub fn decode_blob<V: WaitFreeValue>(sequence: usize, blob: &[u8]) -> Result<V, StoreError> {
    let write_sequence = blob_write_sequence(sequence, blob)?;
    V::decode(&blob[BLOB_HEADER_LEN..], write_sequence).map_err(|e| StoreError::Decode {
        sequence,
        source: BoxedDecodeError::from(e),
    })
}
