// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The wait-free segmented object map.
//!
//! # Write protocol
//!
//! 1. Locate the owning segment, growing the segment table under a short
//!    exclusive lock only when the sequence lies past its end.
//! 2. Load the slot's current blob and read its write-sequence token.
//! 3. If the incoming value was derived from a different token, merge it with
//!    the stored value ([`WaitFreeValue::merge`]).
//! 4. Stamp the result with a fresh token and compare-and-set it against the
//!    blob read in step 2.
//! 5. On a lost race, start again from step 2 with the original value.
//!
//! A lost race never discards data: the loser re-merges against the winner's
//! blob, so every attempt strictly grows the stored content.
//!
//! # Paging
//!
//! Segments are paged in on first access and admitted to an LRU budget. When
//! the budget is exceeded the least recently used segment is written back (if
//! dirty) and dropped, but only when no in-flight operation still holds it.

use std::fs;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::cache::SegmentCache;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::segment::{Blob, Segment};
use crate::value::{blob_write_sequence, decode_blob, encode_blob, WaitFreeValue};
use crate::write_sequence::WriteSequenceAllocator;

/// Attempts between "slow compare-and-set" warnings.
const SLOW_CAS_WARN_EVERY: u32 = 1024;

/// One entry of the segment table.
#[derive(Debug)]
struct SegmentEntry {
    index: usize,
    resident: RwLock<Option<Arc<Segment>>>,
    persisted: AtomicBool,
}

impl SegmentEntry {
    fn new(index: usize, persisted: bool) -> Self {
        Self {
            index,
            resident: RwLock::new(None),
            persisted: AtomicBool::new(persisted),
        }
    }
}

/// Lock-free key/value store keyed by dense non-negative sequence.
///
/// Values implement [`WaitFreeValue`], which supplies the byte codec and the
/// merge used to resolve concurrent writes to the same slot.
#[derive(Debug)]
pub struct WaitFreeMap<V> {
    config: StoreConfig,
    table: RwLock<Vec<Arc<SegmentEntry>>>,
    allocator: Arc<WriteSequenceAllocator>,
    cache: SegmentCache,
    _value: PhantomData<fn() -> V>,
}

impl<V: WaitFreeValue> WaitFreeMap<V> {
    /// Open a map with its own write-sequence allocator.
    ///
    /// For disk-backed configurations, existing segment files under the
    /// configured directory are discovered (but not loaded) here.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let allocator = Arc::new(WriteSequenceAllocator::new(config.write_sequence_stripes));
        Self::open_with_allocator(config, allocator)
    }

    /// Open a map that draws write-sequence tokens from a shared allocator.
    pub fn open_with_allocator(
        config: StoreConfig,
        allocator: Arc<WriteSequenceAllocator>,
    ) -> Result<Self, StoreError> {
        config.validate()?;
        let (table, cache) = match &config.directory {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
                let table = discover_segments(dir, &config.file_prefix)?;
                let capacity =
                    NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
                (table, SegmentCache::bounded(capacity))
            }
            None => (Vec::new(), SegmentCache::unbounded()),
        };
        debug!(
            segments = table.len(),
            directory = ?config.directory,
            "opened wait-free map"
        );
        Ok(Self {
            config,
            table: RwLock::new(table),
            allocator,
            cache,
            _value: PhantomData,
        })
    }

    /// Configuration the map was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Shared write-sequence allocator.
    pub fn allocator(&self) -> &Arc<WriteSequenceAllocator> {
        &self.allocator
    }

    /// Number of segments in the table (resident or not).
    pub fn segment_count(&self) -> usize {
        self.table.read().len()
    }

    /// Decoded value at `sequence`, or `None` when the slot is unset or lies
    /// past the end of the table.
    pub fn get(&self, sequence: usize) -> Result<Option<V>, StoreError> {
        match self.load_blob(sequence)? {
            Some(blob) => decode_blob(sequence, &blob).map(Some),
            None => Ok(None),
        }
    }

    /// Returns `true` when the slot at `sequence` holds a value.
    pub fn contains_key(&self, sequence: usize) -> Result<bool, StoreError> {
        Ok(self.load_blob(sequence)?.is_some())
    }

    /// Store `value` at `sequence`, merging with whatever a concurrent writer
    /// stored first. Returns the value as it was finally written.
    pub fn put(&self, sequence: usize, value: V) -> Result<V, StoreError> {
        let (segment_index, offset) = self.locate(sequence);
        let entry = self.entry_or_grow(segment_index);
        let segment = self.acquire(&entry)?;
        let slot = segment.slot(offset);

        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let current: Option<Blob> = slot.load_full();

            let mut candidate = value.clone();
            if let Some(blob) = &current {
                let stored_token = blob_write_sequence(sequence, blob)?;
                if candidate.write_sequence() != stored_token {
                    let existing: V = decode_blob(sequence, blob)?;
                    candidate = candidate.merge(existing, stored_token);
                }
            }
            candidate.set_write_sequence(self.allocator.next(sequence));
            let next: Blob = Arc::new(encode_blob(&candidate));

            let previous = slot.compare_and_swap(&current, Some(next));
            if same_blob(&previous, &current) {
                segment.mark_dirty();
                if attempts > 1 {
                    trace!(sequence, attempts, "compare-and-set landed after retries");
                }
                return Ok(candidate);
            }

            trace!(sequence, attempts, "compare-and-set lost, re-merging");
            if let Some(limit) = self.config.cas_retry_limit {
                if attempts >= limit {
                    return Err(StoreError::CasRetryExhausted { sequence, attempts });
                }
            }
            if attempts % SLOW_CAS_WARN_EVERY == 0 {
                warn!(sequence, attempts, "compare-and-set still contended");
            }
        }
    }

    /// Number of populated slots. Pages in every segment.
    pub fn len(&self) -> Result<usize, StoreError> {
        let mut total = 0;
        for entry in self.entries() {
            total += self.acquire(&entry)?.populated();
        }
        Ok(total)
    }

    /// Returns `true` when no slot is populated.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Sequences of all populated slots, ascending.
    pub fn keys(&self) -> Result<Vec<usize>, StoreError> {
        let mut keys = Vec::new();
        for entry in self.entries() {
            let segment = self.acquire(&entry)?;
            let base = segment.index() * self.config.segment_size;
            for offset in 0..segment.slot_count() {
                if segment.slot(offset).load().is_some() {
                    keys.push(base + offset);
                }
            }
        }
        Ok(keys)
    }

    /// Lazily enumerate `(sequence, value)` for every populated slot.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            map: self,
            next_segment: 0,
            current: None,
            offset: 0,
        }
    }

    /// Visit every populated slot from `workers` scoped threads.
    ///
    /// Workers claim whole segments from a shared counter, so visitation order
    /// is unspecified. The first error stops further claims and is returned.
    pub fn par_for_each<F>(&self, workers: usize, f: F) -> Result<(), StoreError>
    where
        F: Fn(usize, V) + Sync,
    {
        let entries = self.entries();
        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let workers = workers.max(1);

        let results: Vec<Result<(), StoreError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let entries = &entries;
                    let next = &next;
                    let failed = &failed;
                    let f = &f;
                    s.spawn(move || -> Result<(), StoreError> {
                        loop {
                            if failed.load(Ordering::Acquire) {
                                return Ok(());
                            }
                            let claimed = next.fetch_add(1, Ordering::Relaxed);
                            let Some(entry) = entries.get(claimed) else {
                                return Ok(());
                            };
                            let visit = || -> Result<(), StoreError> {
                                let segment = self.acquire(entry)?;
                                let base = segment.index() * self.config.segment_size;
                                for offset in 0..segment.slot_count() {
                                    if let Some(blob) = segment.slot(offset).load_full() {
                                        let sequence = base + offset;
                                        f(sequence, decode_blob(sequence, &blob)?);
                                    }
                                }
                                Ok(())
                            };
                            if let Err(e) = visit() {
                                failed.store(true, Ordering::Release);
                                return Err(e);
                            }
                        }
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(result) => result,
                    Err(e) => std::panic::resume_unwind(e),
                })
                .collect()
        });

        results.into_iter().collect()
    }

    fn locate(&self, sequence: usize) -> (usize, usize) {
        (
            sequence / self.config.segment_size,
            sequence % self.config.segment_size,
        )
    }

    fn entry(&self, segment_index: usize) -> Option<Arc<SegmentEntry>> {
        self.table.read().get(segment_index).cloned()
    }

    fn entry_or_grow(&self, segment_index: usize) -> Arc<SegmentEntry> {
        if let Some(entry) = self.entry(segment_index) {
            return entry;
        }
        let mut table = self.table.write();
        let before = table.len();
        while table.len() <= segment_index {
            let index = table.len();
            table.push(Arc::new(SegmentEntry::new(index, false)));
        }
        if table.len() != before {
            debug!(from = before, to = table.len(), "grew segment table");
        }
        Arc::clone(&table[segment_index])
    }

    fn load_blob(&self, sequence: usize) -> Result<Option<Blob>, StoreError> {
        let (segment_index, offset) = self.locate(sequence);
        let Some(entry) = self.entry(segment_index) else {
            return Ok(None);
        };
        let segment = self.acquire(&entry)?;
        Ok(segment.slot(offset).load_full())
    }

    /// Resident segment for `entry`, paging it in if needed.
    fn acquire(&self, entry: &SegmentEntry) -> Result<Arc<Segment>, StoreError> {
        if let Some(segment) = entry.resident.read().as_ref() {
            self.cache.touch(entry.index);
            return Ok(Arc::clone(segment));
        }

        let segment = {
            let mut resident = entry.resident.write();
            if let Some(segment) = resident.as_ref() {
                Arc::clone(segment)
            } else {
                let segment = Arc::new(self.page_in(entry)?);
                *resident = Some(Arc::clone(&segment));
                segment
            }
        };

        for victim in self.cache.admit(entry.index) {
            if !self.try_evict(victim)? {
                self.cache.defer(victim);
            }
        }
        Ok(segment)
    }

    fn page_in(&self, entry: &SegmentEntry) -> Result<Segment, StoreError> {
        let size = self.config.segment_size;
        let dir = match self.config.directory.as_deref() {
            Some(dir) if entry.persisted.load(Ordering::Acquire) => dir,
            _ => return Ok(Segment::empty(entry.index, size)),
        };
        let path = self.segment_path(dir, entry.index);
        let segment = Segment::read_from(&path, entry.index, size)?;

        let base = entry.index * size;
        for offset in 0..segment.slot_count() {
            if let Some(blob) = segment.slot(offset).load_full() {
                let sequence = base + offset;
                self.allocator
                    .observe(sequence, blob_write_sequence(sequence, &blob)?);
            }
        }
        debug!(segment = entry.index, path = %path.display(), "paged in segment");
        Ok(segment)
    }

    /// Drop segment `index` if nothing holds it. Returns `false` when the
    /// segment is still resident because it was busy.
    fn try_evict(&self, index: usize) -> Result<bool, StoreError> {
        let Some(dir) = self.config.directory.as_deref() else {
            return Ok(true);
        };
        let Some(entry) = self.entry(index) else {
            return Ok(true);
        };
        let Some(mut resident) = entry.resident.try_write() else {
            trace!(segment = index, "eviction deferred, segment busy");
            return Ok(false);
        };
        let Some(segment) = resident.as_ref() else {
            return Ok(true);
        };
        if Arc::strong_count(segment) > 1 {
            trace!(segment = index, "eviction deferred, segment in use");
            return Ok(false);
        }
        let segment = Arc::clone(segment);
        self.write_back(dir, &entry, &segment)?;
        *resident = None;
        debug!(segment = index, "evicted segment");
        Ok(true)
    }
}

impl<V> WaitFreeMap<V> {
    /// Write every dirty resident segment to disk. No-op for memory-only maps.
    pub fn flush(&self) -> Result<(), StoreError> {
        let Some(dir) = self.config.directory.as_deref() else {
            return Ok(());
        };
        let mut written = 0usize;
        for entry in self.entries() {
            let resident = entry.resident.read().clone();
            if let Some(segment) = resident {
                if self.write_back(dir, &entry, &segment)? {
                    written += 1;
                }
            }
        }
        debug!(written, "flushed dirty segments");
        Ok(())
    }

    /// Alias for [`flush`](Self::flush).
    pub fn write(&self) -> Result<(), StoreError> {
        self.flush()
    }

    fn entries(&self) -> Vec<Arc<SegmentEntry>> {
        self.table.read().clone()
    }

    /// Persist `segment` if dirty. Returns whether a file was written.
    fn write_back(
        &self,
        dir: &Path,
        entry: &SegmentEntry,
        segment: &Segment,
    ) -> Result<bool, StoreError> {
        if !segment.take_dirty() {
            return Ok(false);
        }
        let path = self.segment_path(dir, entry.index);
        if let Err(e) = segment.write_to(&path) {
            segment.mark_dirty();
            return Err(e);
        }
        entry.persisted.store(true, Ordering::Release);
        trace!(segment = entry.index, path = %path.display(), "wrote segment");
        Ok(true)
    }

    fn segment_path(&self, dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("{}{index}.seg", self.config.file_prefix))
    }
}

impl<V> Drop for WaitFreeMap<V> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "dropping map with unflushed segments");
        }
    }
}

/// Lazy iterator over populated slots, see [`WaitFreeMap::iter`].
pub struct Iter<'a, V> {
    map: &'a WaitFreeMap<V>,
    next_segment: usize,
    current: Option<Arc<Segment>>,
    offset: usize,
}

impl<V: WaitFreeValue> Iterator for Iter<'_, V> {
    type Item = Result<(usize, V), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(segment) = &self.current {
                while self.offset < segment.slot_count() {
                    let offset = self.offset;
                    self.offset += 1;
                    if let Some(blob) = segment.slot(offset).load_full() {
                        let sequence = segment.index() * self.map.config.segment_size + offset;
                        return Some(decode_blob(sequence, &blob).map(|v| (sequence, v)));
                    }
                }
                self.current = None;
            }

            let entry = self.map.entry(self.next_segment)?;
            self.next_segment += 1;
            self.offset = 0;
            match self.map.acquire(&entry) {
                Ok(segment) => self.current = Some(segment),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn same_blob(a: &Option<Blob>, b: &Option<Blob>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn discover_segments(dir: &Path, prefix: &str) -> Result<Vec<Arc<SegmentEntry>>, StoreError> {
    let mut found: Vec<usize> = Vec::new();
    let listing = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    for item in listing {
        let item = item.map_err(|e| StoreError::io(dir, e))?;
        let name = item.file_name();
        let Some(index) = name
            .to_str()
            .and_then(|n| n.strip_prefix(prefix))
            .and_then(|n| n.strip_suffix(".seg"))
            .and_then(|n| n.parse::<usize>().ok())
        else {
            continue;
        };
        found.push(index);
    }

    let len = found.iter().max().map_or(0, |max| max + 1);
    let mut table: Vec<Arc<SegmentEntry>> = (0..len)
        .map(|i| Arc::new(SegmentEntry::new(i, false)))
        .collect();
    for index in found {
        table[index].persisted.store(true, Ordering::Release);
    }
    Ok(table)
}
