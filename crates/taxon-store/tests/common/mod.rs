// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::collections::BTreeSet;

use bytes::{Buf, BufMut, BytesMut};
use taxon_store::{WaitFreeValue, NO_WRITE_SEQUENCE};

/// Grow-only set of integers; merge is set union.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrowSet {
    pub write_sequence: i32,
    pub items: BTreeSet<u32>,
}

impl GrowSet {
    pub fn of(items: impl IntoIterator<Item = u32>) -> Self {
        Self {
            write_sequence: NO_WRITE_SEQUENCE,
            items: items.into_iter().collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("payload length {0} is not a multiple of 4")]
pub struct RaggedPayload(pub usize);

impl WaitFreeValue for GrowSet {
    type Error = RaggedPayload;

    fn write_sequence(&self) -> i32 {
        self.write_sequence
    }

    fn set_write_sequence(&mut self, write_sequence: i32) {
        self.write_sequence = write_sequence;
    }

    fn encode(&self, buf: &mut BytesMut) {
        for item in &self.items {
            buf.put_u32(*item);
        }
    }

    fn decode(payload: &[u8], write_sequence: i32) -> Result<Self, Self::Error> {
        if payload.len() % 4 != 0 {
            return Err(RaggedPayload(payload.len()));
        }
        let mut cur = payload;
        let mut items = BTreeSet::new();
        while cur.has_remaining() {
            items.insert(cur.get_u32());
        }
        Ok(Self {
            write_sequence,
            items,
        })
    }

    fn merge(mut self, existing: Self, _existing_write_sequence: i32) -> Self {
        self.items.extend(existing.items);
        self
    }
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
