// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used)]
use proptest::prelude::*;
use taxon_core::{StampSequence, TaxonomyFlags, TaxonomyRecord};
use taxon_store::{StoreConfig, WaitFreeMap, WaitFreeValue, NO_WRITE_SEQUENCE};

type Edge = (i32, i32, i32, i32);

fn edges() -> impl Strategy<Value = Vec<Edge>> {
    prop::collection::vec((0i32..12, 0i32..4, 1i32..20, 1i32..16), 0..24)
}

fn record(edges: &[Edge]) -> TaxonomyRecord {
    let mut r = TaxonomyRecord::new();
    for &(dest, ty, stamp, bits) in edges {
        r.add_stamp_record(dest, ty, StampSequence(stamp), TaxonomyFlags::from_bits_retain(bits));
    }
    r
}

fn union(a: &TaxonomyRecord, b: &TaxonomyRecord) -> TaxonomyRecord {
    a.clone().merge(b.clone(), NO_WRITE_SEQUENCE)
}

proptest! {
    #[test]
    fn merge_is_commutative(a in edges(), b in edges()) {
        let (a, b) = (record(&a), record(&b));
        prop_assert_eq!(union(&a, &b), union(&b, &a));
    }

    #[test]
    fn merge_is_associative(a in edges(), b in edges(), c in edges()) {
        let (a, b, c) = (record(&a), record(&b), record(&c));
        prop_assert_eq!(union(&union(&a, &b), &c), union(&a, &union(&b, &c)));
    }

    #[test]
    fn merge_is_idempotent(a in edges()) {
        let a = record(&a);
        prop_assert_eq!(union(&a, &a), a);
    }

    // Nothing added by any delta is missing afterwards, and its flags only
    // ever gain bits.
    #[test]
    fn merges_never_lose_triples(deltas in prop::collection::vec(edges(), 1..5)) {
        let mut merged = TaxonomyRecord::new();
        for delta in &deltas {
            merged = merged.merge(record(delta), NO_WRITE_SEQUENCE);
        }
        for &(dest, ty, stamp, bits) in deltas.iter().flatten() {
            let wanted = TaxonomyFlags::from_bits_retain(bits);
            let found = merged
                .triples(dest)
                .into_iter()
                .find(|t| t.type_nid == ty && t.stamp == StampSequence(stamp));
            prop_assert!(found.is_some_and(|t| t.flags.contains(wanted)));
        }
    }

    #[test]
    fn concurrent_deltas_converge_in_the_map(
        deltas in prop::collection::vec(edges(), 1..6),
        concept in 0usize..64,
    ) {
        let map: WaitFreeMap<TaxonomyRecord> =
            WaitFreeMap::open(StoreConfig::in_memory().with_segment_size(16)).unwrap();

        std::thread::scope(|s| {
            for delta in &deltas {
                let map = &map;
                s.spawn(move || {
                    map.put(concept, record(delta)).unwrap();
                });
            }
        });

        let expected = deltas
            .iter()
            .fold(TaxonomyRecord::new(), |acc, d| union(&acc, &record(d)));
        let stored = map.get(concept).unwrap().unwrap_or_default();
        prop_assert_eq!(stored.pack(), expected.pack());
    }
}
