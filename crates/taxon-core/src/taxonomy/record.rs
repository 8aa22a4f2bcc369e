// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Append-only, union-merged edge history of one origin concept.
//!
//! # Packed form
//!
//! ```text
//! [ dest, count, (type, stamp, flags) * count, dest, count, ... ]
//! ```
//!
//! Destinations ascend, and within a group triples ascend by
//! `(type, stamp)`. Packing is therefore canonical: equal records pack to
//! equal arrays. In a map slot the array is written as big-endian `i32`s
//! after the write-sequence header.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, BytesMut};
use rustc_hash::FxHashMap;
use taxon_store::{WaitFreeValue, NO_WRITE_SEQUENCE};

use super::TaxonomyFlags;
use crate::error::RecordDecodeError;
use crate::ident::{Nid, StampSequence};
use crate::position::RelativePositionCalculator;
use crate::stamp::{Status, StatusSet};

/// One stamped, flagged edge towards a destination.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EdgeTriple {
    /// Relationship type (the IS-A nid for taxonomy parents).
    pub type_nid: Nid,
    /// Version stamp of the assertion or retirement.
    pub stamp: StampSequence,
    /// Provenance bits.
    pub flags: TaxonomyFlags,
}

type EdgeGroup = BTreeMap<(Nid, StampSequence), TaxonomyFlags>;

/// Every edge ever asserted from one concept, across all paths and times.
///
/// Edges are never removed. A retirement is a further triple whose stamp is
/// inactive. Two triples with the same `(type, stamp)` towards the same
/// destination are one edge; their flags are unioned.
///
/// Equality compares edge content only; the write-sequence token is storage
/// metadata.
#[derive(Clone, Debug, Default)]
pub struct TaxonomyRecord {
    write_sequence: i32,
    edges: FxHashMap<Nid, EdgeGroup>,
}

impl PartialEq for TaxonomyRecord {
    fn eq(&self, other: &Self) -> bool {
        self.edges == other.edges
    }
}

impl Eq for TaxonomyRecord {}

impl TaxonomyRecord {
    /// Empty record with no slot version.
    pub fn new() -> Self {
        Self {
            write_sequence: NO_WRITE_SEQUENCE,
            edges: FxHashMap::default(),
        }
    }

    /// Append one edge triple under `destination`.
    pub fn add_stamp_record(
        &mut self,
        destination: Nid,
        type_nid: Nid,
        stamp: StampSequence,
        flags: TaxonomyFlags,
    ) {
        self.edges
            .entry(destination)
            .or_default()
            .entry((type_nid, stamp))
            .and_modify(|f| *f |= flags)
            .or_insert(flags);
    }

    /// Record a status version of `concept` itself.
    pub fn add_concept_status(&mut self, concept: Nid, stamp: StampSequence) {
        self.add_stamp_record(concept, concept, stamp, TaxonomyFlags::CONCEPT_STATUS);
    }

    /// Fold every triple of `other` into `self`.
    pub fn union_with(&mut self, other: Self) {
        for (destination, group) in other.edges {
            let target = self.edges.entry(destination).or_default();
            for (key, flags) in group {
                target
                    .entry(key)
                    .and_modify(|f| *f |= flags)
                    .or_insert(flags);
            }
        }
    }

    /// Returns `true` when no triple has been recorded.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of triples across all destinations.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    /// Number of distinct destinations.
    pub fn destination_count(&self) -> usize {
        self.edges.len()
    }

    /// Destinations in ascending order.
    pub fn destinations(&self) -> Vec<Nid> {
        let mut out: Vec<Nid> = self.edges.keys().copied().collect();
        out.sort_unstable();
        out
    }

    /// Triples recorded towards `destination`, ordered by `(type, stamp)`.
    pub fn triples(&self, destination: Nid) -> Vec<EdgeTriple> {
        self.edges.get(&destination).map_or_else(Vec::new, |group| {
            group
                .iter()
                .map(|(&(type_nid, stamp), &flags)| EdgeTriple {
                    type_nid,
                    stamp,
                    flags,
                })
                .collect()
        })
    }

    /// Flatten to the packed integer form.
    pub fn pack(&self) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.edges.len() * 2 + self.edge_count() * 3);
        for destination in self.destinations() {
            let Some(group) = self.edges.get(&destination) else {
                continue;
            };
            out.push(destination);
            out.push(i32::try_from(group.len()).unwrap_or(i32::MAX));
            for (&(type_nid, stamp), flags) in group {
                out.extend([type_nid, stamp.get(), flags.bits()]);
            }
        }
        out
    }

    /// Rebuild a record from [`pack`](Self::pack) output.
    pub fn unpack(ints: &[i32]) -> Result<Self, RecordDecodeError> {
        let mut record = Self::new();
        let mut at = 0;
        while at < ints.len() {
            let (Some(&destination), Some(&declared)) = (ints.get(at), ints.get(at + 1)) else {
                return Err(RecordDecodeError::DanglingHeader(at));
            };
            let count = usize::try_from(declared).map_err(|_| RecordDecodeError::NegativeCount {
                destination,
                declared,
            })?;
            at += 2;
            let available = ints.len() - at;
            let needed = count.saturating_mul(3);
            if needed > available {
                return Err(RecordDecodeError::TruncatedGroup {
                    destination,
                    declared,
                    available,
                });
            }
            for triple in ints[at..at + needed].chunks_exact(3) {
                record.add_stamp_record(
                    destination,
                    triple[0],
                    StampSequence(triple[1]),
                    TaxonomyFlags::from_bits_retain(triple[2]),
                );
            }
            // Keep empty groups so that pack/unpack stays exact.
            record.edges.entry(destination).or_default();
            at += needed;
        }
        Ok(record)
    }

    /// Statuses visible for `concept`'s own status triples. More than one
    /// member means the view is contradictory.
    pub fn concept_states(&self, concept: Nid, calc: &RelativePositionCalculator) -> StatusSet {
        calc.latest_statuses(self.stamps_for(concept, concept, TaxonomyFlags::CONCEPT_STATUS))
    }

    /// Returns `true` when an active status version of `concept` is visible.
    pub fn is_concept_active(&self, concept: Nid, calc: &RelativePositionCalculator) -> bool {
        self.concept_states(concept, calc).allows(Status::Active)
    }

    /// Returns `true` when an edge of `type_nid` towards `destination`
    /// matching `flags` is visible and active.
    pub fn contains_concept_nid_via_type(
        &self,
        destination: Nid,
        type_nid: Nid,
        flags: TaxonomyFlags,
        calc: &RelativePositionCalculator,
    ) -> bool {
        calc.is_latest_active(self.stamps_for(destination, type_nid, flags))
    }

    /// As [`contains_concept_nid_via_type`](Self::contains_concept_nid_via_type)
    /// for any of `type_nids`.
    pub fn contains_concept_nid_via_type_set(
        &self,
        destination: Nid,
        type_nids: &[Nid],
        flags: TaxonomyFlags,
        calc: &RelativePositionCalculator,
    ) -> bool {
        type_nids
            .iter()
            .any(|t| self.contains_concept_nid_via_type(destination, *t, flags, calc))
    }

    /// Destinations reachable through a visible, active edge of `type_nid`.
    pub fn concept_nids_for_type(
        &self,
        type_nid: Nid,
        flags: TaxonomyFlags,
        calc: &RelativePositionCalculator,
    ) -> Vec<Nid> {
        self.destinations()
            .into_iter()
            .filter(|d| self.contains_concept_nid_via_type(*d, type_nid, flags, calc))
            .collect()
    }

    /// Relationship types with a visible, active edge towards `destination`.
    pub fn types_for_relationship(
        &self,
        destination: Nid,
        flags: TaxonomyFlags,
        calc: &RelativePositionCalculator,
    ) -> Vec<Nid> {
        let Some(group) = self.edges.get(&destination) else {
            return Vec::new();
        };
        let mut types: Vec<Nid> = group
            .iter()
            .filter(|(_, f)| f.answers(flags))
            .map(|(&(t, _), _)| t)
            .collect();
        types.dedup();
        types.retain(|t| self.contains_concept_nid_via_type(destination, *t, flags, calc));
        types
    }

    fn stamps_for(
        &self,
        destination: Nid,
        type_nid: Nid,
        flags: TaxonomyFlags,
    ) -> impl Iterator<Item = StampSequence> + '_ {
        self.edges
            .get(&destination)
            .into_iter()
            .flat_map(move |group| {
                group.range((type_nid, StampSequence(i32::MIN))..=(type_nid, StampSequence(i32::MAX)))
            })
            .filter(move |(_, f)| f.answers(flags))
            .map(|(&(_, stamp), _)| stamp)
    }
}

impl WaitFreeValue for TaxonomyRecord {
    type Error = RecordDecodeError;

    fn write_sequence(&self) -> i32 {
        self.write_sequence
    }

    fn set_write_sequence(&mut self, write_sequence: i32) {
        self.write_sequence = write_sequence;
    }

    fn encode(&self, buf: &mut BytesMut) {
        let packed = self.pack();
        buf.reserve(packed.len() * 4);
        for value in packed {
            buf.put_i32(value);
        }
    }

    fn decode(payload: &[u8], write_sequence: i32) -> Result<Self, Self::Error> {
        if payload.len() % 4 != 0 {
            return Err(RecordDecodeError::RaggedPayload(payload.len()));
        }
        let mut cur = payload;
        let mut ints = Vec::with_capacity(payload.len() / 4);
        while cur.has_remaining() {
            ints.push(cur.get_i32());
        }
        let mut record = Self::unpack(&ints)?;
        record.write_sequence = write_sequence;
        Ok(record)
    }

    fn merge(mut self, existing: Self, _existing_write_sequence: i32) -> Self {
        self.union_with(existing);
        self
    }
}
