// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
use std::collections::BTreeSet;
use std::sync::Mutex;

use taxon_store::{StoreConfig, StoreError, WaitFreeMap, WaitFreeValue};

mod common;
use common::{init_tracing, GrowSet};

fn memory_map() -> WaitFreeMap<GrowSet> {
    WaitFreeMap::open(StoreConfig::in_memory().with_segment_size(8)).expect("open")
}

#[test]
fn put_then_get_returns_the_value() {
    let map = memory_map();
    map.put(3, GrowSet::of([1, 2])).unwrap();
    let got = map.get(3).unwrap().unwrap();
    assert_eq!(got.items, BTreeSet::from([1, 2]));
    assert_ne!(got.write_sequence(), 0);
}

#[test]
fn unset_slots_and_slots_past_the_table_are_empty() {
    let map = memory_map();
    assert!(map.get(0).unwrap().is_none());
    map.put(1, GrowSet::of([5])).unwrap();
    assert!(map.get(0).unwrap().is_none());
    assert!(map.get(10_000).unwrap().is_none());
    assert_eq!(map.segment_count(), 1);
}

#[test]
fn table_grows_to_cover_far_sequences() {
    let map = memory_map();
    map.put(8 * 5 + 1, GrowSet::of([7])).unwrap();
    assert_eq!(map.segment_count(), 6);
    assert!(map.contains_key(41).unwrap());
    assert!(!map.contains_key(40).unwrap());
}

#[test]
fn fresh_value_is_merged_with_stored_value() {
    let map = memory_map();
    map.put(0, GrowSet::of([1])).unwrap();
    let written = map.put(0, GrowSet::of([2])).unwrap();
    assert_eq!(written.items, BTreeSet::from([1, 2]));
    assert_eq!(map.get(0).unwrap().unwrap().items, BTreeSet::from([1, 2]));
}

#[test]
fn value_read_at_current_token_replaces_without_merge() {
    let map = memory_map();
    map.put(0, GrowSet::of([1, 2])).unwrap();
    let mut current = map.get(0).unwrap().unwrap();
    current.items = BTreeSet::from([9]);
    map.put(0, current).unwrap();
    assert_eq!(map.get(0).unwrap().unwrap().items, BTreeSet::from([9]));
}

#[test]
fn stale_token_forces_merge() {
    let map = memory_map();
    map.put(0, GrowSet::of([1])).unwrap();
    let mut stale = map.get(0).unwrap().unwrap();
    map.put(0, GrowSet::of([2])).unwrap();
    stale.items.insert(3);
    map.put(0, stale).unwrap();
    assert_eq!(map.get(0).unwrap().unwrap().items, BTreeSet::from([1, 2, 3]));
}

#[test]
fn concurrent_writers_to_one_slot_lose_nothing() {
    init_tracing();
    let map = memory_map();
    let writers = 8u32;
    let per_writer = 64u32;

    std::thread::scope(|s| {
        for w in 0..writers {
            let map = &map;
            s.spawn(move || {
                for i in 0..per_writer {
                    map.put(5, GrowSet::of([w * per_writer + i])).unwrap();
                }
            });
        }
    });

    let expected: BTreeSet<u32> = (0..writers * per_writer).collect();
    assert_eq!(map.get(5).unwrap().unwrap().items, expected);
}

#[test]
fn iter_and_keys_enumerate_populated_slots_in_order() {
    let map = memory_map();
    for seq in [17usize, 2, 9] {
        map.put(seq, GrowSet::of([u32::try_from(seq).unwrap()])).unwrap();
    }
    assert_eq!(map.keys().unwrap(), vec![2, 9, 17]);
    assert_eq!(map.len().unwrap(), 3);

    let seen: Vec<(usize, BTreeSet<u32>)> = map
        .iter()
        .map(|r| r.map(|(seq, v)| (seq, v.items)))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        seen,
        vec![
            (2, BTreeSet::from([2])),
            (9, BTreeSet::from([9])),
            (17, BTreeSet::from([17])),
        ]
    );
}

#[test]
fn par_for_each_visits_every_slot_once() {
    let map = memory_map();
    for seq in 0..100usize {
        map.put(seq, GrowSet::of([u32::try_from(seq).unwrap()])).unwrap();
    }
    let seen = Mutex::new(Vec::new());
    map.par_for_each(4, |seq, value| {
        assert_eq!(value.items.len(), 1);
        seen.lock().unwrap().push(seq);
    })
    .unwrap();
    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
}

#[test]
fn disk_map_survives_reopen_and_eviction() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::on_disk(dir.path())
        .with_segment_size(4)
        .with_cache_capacity(1);

    {
        let map: WaitFreeMap<GrowSet> = WaitFreeMap::open(config.clone()).unwrap();
        for seq in 0..16usize {
            map.put(seq, GrowSet::of([u32::try_from(seq).unwrap() * 10]))
                .unwrap();
        }
        map.flush().unwrap();
        assert!(dir.path().join("segment-0.seg").exists());
        assert!(dir.path().join("segment-3.seg").exists());
    }

    let map: WaitFreeMap<GrowSet> = WaitFreeMap::open(config).unwrap();
    assert_eq!(map.segment_count(), 4);
    for seq in 0..16usize {
        let got = map.get(seq).unwrap().unwrap();
        assert_eq!(got.items, BTreeSet::from([u32::try_from(seq).unwrap() * 10]));
    }
}

#[test]
fn reopened_map_never_reissues_a_stored_token() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::on_disk(dir.path()).with_segment_size(4);
    let stored = {
        let map: WaitFreeMap<GrowSet> = WaitFreeMap::open(config.clone()).unwrap();
        for i in 0..5 {
            map.put(1, GrowSet::of([i])).unwrap();
        }
        map.get(1).unwrap().unwrap().write_sequence()
    };

    let map: WaitFreeMap<GrowSet> = WaitFreeMap::open(config).unwrap();
    let mut stale = map.get(1).unwrap().unwrap();
    assert_eq!(stale.write_sequence(), stored);
    map.put(1, GrowSet::of([100])).unwrap();
    assert_ne!(map.get(1).unwrap().unwrap().write_sequence(), stored);

    stale.items.insert(200);
    map.put(1, stale).unwrap();
    let items = map.get(1).unwrap().unwrap().items;
    assert!(items.contains(&100));
    assert!(items.contains(&200));
}

#[test]
fn corrupt_segment_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("segment-0.seg"), [0u8, 0, 0]).unwrap();
    let map: WaitFreeMap<GrowSet> =
        WaitFreeMap::open(StoreConfig::on_disk(dir.path()).with_segment_size(4)).unwrap();
    let err = map.get(0).unwrap_err();
    assert!(matches!(err, StoreError::Truncated { .. }));
}

#[test]
fn undecodable_blob_is_reported_with_its_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = Vec::new();
    file.extend_from_slice(&0i32.to_be_bytes());
    file.extend_from_slice(&6i32.to_be_bytes());
    file.extend_from_slice(&[0, 0, 0, 1, 0xAA, 0xBB]);
    file.extend_from_slice(&(-1i32).to_be_bytes());
    std::fs::write(dir.path().join("segment-0.seg"), file).unwrap();

    let map: WaitFreeMap<GrowSet> =
        WaitFreeMap::open(StoreConfig::on_disk(dir.path()).with_segment_size(2)).unwrap();
    let err = map.get(0).unwrap_err();
    assert!(matches!(err, StoreError::Decode { sequence: 0, .. }));
    assert!(map.get(1).unwrap().is_none());
}

#[test]
fn invalid_config_is_rejected_at_open() {
    let err = WaitFreeMap::<GrowSet>::open(StoreConfig::in_memory().with_segment_size(0))
        .unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}
