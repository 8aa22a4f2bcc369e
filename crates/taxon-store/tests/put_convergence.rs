// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used)]
use std::collections::BTreeSet;

use proptest::prelude::*;
use taxon_store::{StoreConfig, WaitFreeMap};

mod common;
use common::GrowSet;

proptest! {
    // Any partition of the items across writers, applied concurrently, ends
    // with the union in the slot.
    #[test]
    fn concurrent_puts_converge_to_union(
        batches in prop::collection::vec(prop::collection::btree_set(0u32..500, 0..12), 1..6),
        slot in 0usize..40,
    ) {
        let map: WaitFreeMap<GrowSet> =
            WaitFreeMap::open(StoreConfig::in_memory().with_segment_size(16)).unwrap();

        std::thread::scope(|s| {
            for batch in &batches {
                let map = &map;
                s.spawn(move || {
                    for item in batch {
                        map.put(slot, GrowSet::of([*item])).unwrap();
                    }
                });
            }
        });

        let expected: BTreeSet<u32> = batches.iter().flatten().copied().collect();
        let stored = map.get(slot).unwrap().map(|v| v.items).unwrap_or_default();
        prop_assert_eq!(stored, expected);
    }
}
