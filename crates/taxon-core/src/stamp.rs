// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stamps: interned (status, time, author, module, path) provenance tuples.
//!
//! Everything outside this module refers to a stamp by its
//! [`StampSequence`]. Interning is idempotent: two equal tuples always
//! resolve to the same sequence, and a sequence is never rebound.

use std::fs;
use std::path::Path;

use bitflags::bitflags;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::TaxonomyError;
use crate::ident::{Nid, StampSequence};

/// Lifecycle status carried by a stamp.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Status {
    /// The version asserts the component.
    Active,
    /// The version retires the component.
    Inactive,
    /// State before the component had any authored version.
    Primordial,
    /// The version was withdrawn before commit; never visible.
    Canceled,
}

impl Status {
    /// Every status, in declaration order.
    pub const ALL: [Self; 4] = [Self::Active, Self::Inactive, Self::Primordial, Self::Canceled];

    /// Singleton set holding this status.
    pub const fn as_set(self) -> StatusSet {
        match self {
            Self::Active => StatusSet::ACTIVE,
            Self::Inactive => StatusSet::INACTIVE,
            Self::Primordial => StatusSet::PRIMORDIAL,
            Self::Canceled => StatusSet::CANCELED,
        }
    }

    /// Returns `true` only for [`Status::Active`].
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

bitflags! {
    /// Set of [`Status`] values.
    ///
    /// Used both as a filter's allowed-status policy and as the result of a
    /// status query, where more than one member means the view is
    /// contradictory.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
    pub struct StatusSet: u8 {
        /// [`Status::Active`].
        const ACTIVE = 0b0001;
        /// [`Status::Inactive`].
        const INACTIVE = 0b0010;
        /// [`Status::Primordial`].
        const PRIMORDIAL = 0b0100;
        /// [`Status::Canceled`].
        const CANCELED = 0b1000;
    }
}

impl StatusSet {
    /// Only active versions.
    pub const ACTIVE_ONLY: Self = Self::ACTIVE;
    /// Active and inactive versions (the usual "any" view).
    pub const ACTIVE_AND_INACTIVE: Self = Self::ACTIVE.union(Self::INACTIVE);
    /// Every status.
    pub const ANY: Self = Self::all();

    /// Returns `true` when `status` is a member.
    pub const fn allows(self, status: Status) -> bool {
        self.contains(status.as_set())
    }

    /// Number of members.
    pub const fn len(self) -> u32 {
        self.bits().count_ones()
    }

    /// Members in declaration order.
    pub fn statuses(self) -> impl Iterator<Item = Status> {
        Status::ALL.into_iter().filter(move |s| self.allows(*s))
    }
}

impl FromIterator<Status> for StatusSet {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |acc, s| acc.union(s.as_set()))
    }
}

/// One version's provenance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Stamp {
    /// Lifecycle status of the version.
    pub status: Status,
    /// Commit time in epoch milliseconds, or [`Stamp::UNCOMMITTED_TIME`].
    pub time: i64,
    /// Authoring user.
    pub author: Nid,
    /// Owning module.
    pub module: Nid,
    /// Path (branch) the version was committed on.
    pub path: Nid,
}

impl Stamp {
    /// Time sentinel for versions not yet committed. Sorts after every
    /// committed time and is only visible from a "latest" position.
    pub const UNCOMMITTED_TIME: i64 = i64::MAX;

    /// Construct a stamp.
    pub const fn new(status: Status, time: i64, author: Nid, module: Nid, path: Nid) -> Self {
        Self {
            status,
            time,
            author,
            module,
            path,
        }
    }

    /// Same tuple with `status` replaced.
    pub const fn with_status(self, status: Status) -> Self {
        Self { status, ..self }
    }

    /// Returns `true` when the stamp carries the uncommitted sentinel.
    pub const fn is_uncommitted(&self) -> bool {
        self.time == Self::UNCOMMITTED_TIME
    }
}

/// Stamp interning and lookup, as used by the taxonomy engine.
pub trait StampService: Send + Sync {
    /// Resolve a sequence to its tuple.
    fn stamp(&self, sequence: StampSequence) -> Option<Stamp>;

    /// Intern `stamp`, returning its (possibly pre-existing) sequence.
    fn intern(&self, stamp: Stamp) -> Result<StampSequence, TaxonomyError>;

    /// Sequence for the same tuple as `sequence` with status forced to
    /// [`Status::Inactive`].
    fn retired_stamp(&self, sequence: StampSequence) -> Result<StampSequence, TaxonomyError> {
        let stamp = self
            .stamp(sequence)
            .ok_or(TaxonomyError::UnknownStamp(sequence))?;
        self.intern(stamp.with_status(Status::Inactive))
    }
}

#[derive(Debug, Default)]
struct StampTable {
    stamps: Vec<Stamp>,
    index: FxHashMap<Stamp, StampSequence>,
}

/// In-process [`StampService`] backed by a vector and a reverse index.
#[derive(Debug, Default)]
pub struct StampStore {
    table: RwLock<StampTable>,
}

impl StampStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned stamps.
    pub fn len(&self) -> usize {
        self.table.read().stamps.len()
    }

    /// Returns `true` when nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist the table as JSON (sequence order preserved).
    pub fn save(&self, path: &Path) -> Result<(), TaxonomyError> {
        let bytes = serde_json::to_vec(&self.table.read().stamps)?;
        fs::write(path, bytes).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a table written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let bytes = fs::read(path).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stamps: Vec<Stamp> = serde_json::from_slice(&bytes)?;
        let mut index = FxHashMap::default();
        for (i, stamp) in stamps.iter().enumerate() {
            let sequence = sequence_for_index(i)?;
            index.entry(*stamp).or_insert(sequence);
        }
        Ok(Self {
            table: RwLock::new(StampTable { stamps, index }),
        })
    }
}

impl StampService for StampStore {
    fn stamp(&self, sequence: StampSequence) -> Option<Stamp> {
        let i = usize::try_from(sequence.get()).ok()?.checked_sub(1)?;
        self.table.read().stamps.get(i).copied()
    }

    fn intern(&self, stamp: Stamp) -> Result<StampSequence, TaxonomyError> {
        if let Some(seq) = self.table.read().index.get(&stamp) {
            return Ok(*seq);
        }
        let mut table = self.table.write();
        if let Some(seq) = table.index.get(&stamp) {
            return Ok(*seq);
        }
        let seq = sequence_for_index(table.stamps.len())?;
        table.stamps.push(stamp);
        table.index.insert(stamp, seq);
        Ok(seq)
    }
}

fn sequence_for_index(i: usize) -> Result<StampSequence, TaxonomyError> {
    i.checked_add(1)
        .and_then(|n| i32::try_from(n).ok())
        .map(StampSequence)
        .ok_or(TaxonomyError::StampTableFull(i))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MAIN: Nid = 100;

    #[test]
    fn interning_is_idempotent() {
        let store = StampStore::new();
        let a = store.intern(Stamp::new(Status::Active, 10, 1, 2, MAIN)).unwrap();
        let b = store.intern(Stamp::new(Status::Active, 10, 1, 2, MAIN)).unwrap();
        let c = store.intern(Stamp::new(Status::Active, 11, 1, 2, MAIN)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, StampSequence(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn none_sequence_never_resolves() {
        let store = StampStore::new();
        store.intern(Stamp::new(Status::Active, 1, 1, 1, MAIN)).unwrap();
        assert!(store.stamp(StampSequence::NONE).is_none());
        assert!(store.stamp(StampSequence(-3)).is_none());
        assert!(store.stamp(StampSequence(2)).is_none());
    }

    #[test]
    fn retired_stamp_keeps_everything_but_status() {
        let store = StampStore::new();
        let live = store.intern(Stamp::new(Status::Active, 50, 7, 8, MAIN)).unwrap();
        let retired = store.retired_stamp(live).unwrap();
        let s = store.stamp(retired).unwrap();
        assert_eq!(s, Stamp::new(Status::Inactive, 50, 7, 8, MAIN));
        assert_eq!(store.retired_stamp(live).unwrap(), retired);
        assert!(matches!(
            store.retired_stamp(StampSequence(99)),
            Err(TaxonomyError::UnknownStamp(StampSequence(99)))
        ));
    }

    #[test]
    fn sequences_stop_at_the_i32_range() {
        let last = usize::try_from(i32::MAX).unwrap() - 1;
        assert_eq!(sequence_for_index(0).unwrap(), StampSequence(1));
        assert_eq!(sequence_for_index(last).unwrap(), StampSequence(i32::MAX));
        assert!(matches!(
            sequence_for_index(last + 1),
            Err(TaxonomyError::StampTableFull(i)) if i == last + 1
        ));
        assert!(sequence_for_index(usize::MAX).is_err());
    }

    #[test]
    fn status_set_counts_members() {
        let set: StatusSet = [Status::Active, Status::Inactive, Status::Active]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set.allows(Status::Inactive));
        assert!(!set.allows(Status::Canceled));
        assert_eq!(
            set.statuses().collect::<Vec<_>>(),
            vec![Status::Active, Status::Inactive]
        );
    }

    #[test]
    fn save_and_load_preserve_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stamps.json");
        let store = StampStore::new();
        let a = store.intern(Stamp::new(Status::Active, 1, 1, 1, MAIN)).unwrap();
        let b = store
            .intern(Stamp::new(Status::Inactive, Stamp::UNCOMMITTED_TIME, 1, 1, MAIN))
            .unwrap();
        store.save(&path).unwrap();

        let loaded = StampStore::load(&path).unwrap();
        assert_eq!(loaded.stamp(a), store.stamp(a));
        assert_eq!(loaded.stamp(b), store.stamp(b));
        assert_eq!(
            loaded.intern(Stamp::new(Status::Active, 1, 1, 1, MAIN)).unwrap(),
            a
        );
        assert!(loaded.stamp(b).unwrap().is_uncommitted());
    }
}
