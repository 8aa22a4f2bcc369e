// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Striped write-sequence tokens.
//!
//! Each slot's token comes from stripe `sequence % stripes`, so a given slot
//! always draws from the same counter and its tokens never repeat until the
//! counter wraps. Tokens are compared for equality only; they carry no ordering
//! meaning across slots.

use std::sync::atomic::{AtomicI32, Ordering};

/// Token stored with slots that have never been written through the map.
pub const NO_WRITE_SEQUENCE: i32 = 0;

/// Fixed array of atomic counters handing out write-sequence tokens.
///
/// Construct once and share (via `Arc`) with every map that should draw from
/// the same token space.
#[derive(Debug)]
pub struct WriteSequenceAllocator {
    stripes: Box<[AtomicI32]>,
}

impl WriteSequenceAllocator {
    /// Create an allocator with `stripes` counters (at least one).
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1))
            .map(|_| AtomicI32::new(NO_WRITE_SEQUENCE))
            .collect();
        Self { stripes }
    }

    /// Number of counters.
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Allocate the next token for slot `sequence`. Never returns
    /// [`NO_WRITE_SEQUENCE`].
    pub fn next(&self, sequence: usize) -> i32 {
        let stripe = self.stripe(sequence);
        let previous = stripe
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(successor(v)))
            .unwrap_or_else(|v| v);
        successor(previous)
    }

    /// Raise the stripe for `sequence` so later tokens differ from `token`.
    ///
    /// Called when a segment is paged in from disk, where tokens were issued by
    /// an earlier process.
    pub fn observe(&self, sequence: usize, token: i32) {
        if token > NO_WRITE_SEQUENCE {
            self.stripe(sequence).fetch_max(token, Ordering::AcqRel);
        }
    }

    fn stripe(&self, sequence: usize) -> &AtomicI32 {
        &self.stripes[sequence % self.stripes.len()]
    }
}

impl Default for WriteSequenceAllocator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_WRITE_SEQUENCE_STRIPES)
    }
}

const fn successor(v: i32) -> i32 {
    match v.wrapping_add(1) {
        NO_WRITE_SEQUENCE => 1,
        n => n,
    }
}
