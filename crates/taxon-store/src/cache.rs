// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recency tracking for resident segments.
//!
//! The cache only tracks segment indices. Residency itself lives in the map's
//! segment table; when the budget is exceeded the cache names a victim and
//! the map decides whether it can be written back and dropped. A victim the
//! map could not drop is deferred and offered again on the next admission,
//! so it is never left resident without being tracked.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

#[derive(Debug)]
pub(crate) struct SegmentCache {
    lru: Mutex<LruCache<usize, ()>>,
    deferred: Mutex<Vec<usize>>,
}

impl SegmentCache {
    pub(crate) fn bounded(capacity: NonZeroUsize) -> Self {
        Self {
            lru: Mutex::new(LruCache::new(capacity)),
            deferred: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn unbounded() -> Self {
        Self {
            lru: Mutex::new(LruCache::unbounded()),
            deferred: Mutex::new(Vec::new()),
        }
    }

    /// Record that `index` became resident. Returns the indices to evict:
    /// the least recently used index pushed out of the budget, if any,
    /// followed by every earlier deferred victim that is still untracked.
    pub(crate) fn admit(&self, index: usize) -> Vec<usize> {
        let mut lru = self.lru.lock();
        let mut victims = match lru.push(index, ()) {
            Some((evicted, ())) if evicted != index => vec![evicted],
            _ => Vec::new(),
        };
        let deferred = std::mem::take(&mut *self.deferred.lock());
        for pending in deferred {
            if pending != index && !lru.contains(&pending) && !victims.contains(&pending) {
                victims.push(pending);
            }
        }
        victims
    }

    /// Hand back a victim the map could not drop yet.
    pub(crate) fn defer(&self, index: usize) {
        let mut deferred = self.deferred.lock();
        if !deferred.contains(&index) {
            deferred.push(index);
        }
    }

    /// Best-effort recency bump on the read path. Skips the update instead of
    /// waiting when another thread holds the lock.
    pub(crate) fn touch(&self, index: usize) {
        if let Some(mut lru) = self.lru.try_lock() {
            lru.promote(&index);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lru.lock().len()
    }
}
