// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Read-only taxonomy queries for one [`ManifoldCoordinate`].
//!
//! Parents are read straight from the concept's own record. Children need
//! the inverse relation, so the first child-side query scans the whole map
//! once and keeps the result for the lifetime of the navigator. Build a new
//! navigator to observe later writes.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashMap;
use taxon_store::WaitFreeMap;
use tracing::debug;

use crate::coordinate::{ManifoldCoordinate, OriginBoundary};
use crate::error::TaxonomyError;
use crate::ident::{nid_to_sequence, sequence_to_nid, Nid};
use crate::path::PathRegistry;
use crate::position::RelativePositionCalculator;
use crate::stamp::{StampService, StatusSet};
use crate::taxonomy::{TaxonomyFlags, TaxonomyRecord};

/// Parent/child/ancestor queries over a taxonomy map.
pub struct Navigator {
    coordinate: ManifoldCoordinate,
    is_a_nid: Nid,
    map: Arc<WaitFreeMap<TaxonomyRecord>>,
    calc: RelativePositionCalculator,
    children: OnceLock<FxHashMap<Nid, Vec<Nid>>>,
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("coordinate", &self.coordinate)
            .field("is_a_nid", &self.is_a_nid)
            .finish_non_exhaustive()
    }
}

impl Navigator {
    /// Navigator for `coordinate` over `map`.
    pub fn new(
        coordinate: ManifoldCoordinate,
        is_a_nid: Nid,
        map: Arc<WaitFreeMap<TaxonomyRecord>>,
        paths: &PathRegistry,
        stamps: Arc<dyn StampService>,
        boundary: OriginBoundary,
    ) -> Self {
        let calc =
            RelativePositionCalculator::new(coordinate.filter.clone(), paths, stamps, boundary);
        Self {
            coordinate,
            is_a_nid,
            map,
            calc,
            children: OnceLock::new(),
        }
    }

    /// The view this navigator answers for.
    pub fn coordinate(&self) -> &ManifoldCoordinate {
        &self.coordinate
    }

    /// Calculator built from the coordinate's filter.
    pub fn calculator(&self) -> &RelativePositionCalculator {
        &self.calc
    }

    fn flags(&self) -> TaxonomyFlags {
        self.coordinate.premise.flags()
    }

    fn record(&self, concept: Nid) -> Result<Option<TaxonomyRecord>, TaxonomyError> {
        Ok(self.map.get(nid_to_sequence(concept)?)?)
    }

    /// Visible parents of `concept`, ascending.
    pub fn parents(&self, concept: Nid) -> Result<Vec<Nid>, TaxonomyError> {
        Ok(self
            .record(concept)?
            .map_or_else(Vec::new, |r| {
                r.concept_nids_for_type(self.is_a_nid, self.flags(), &self.calc)
            }))
    }

    /// Visible children of `concept`, ascending.
    pub fn children(&self, concept: Nid) -> Result<Vec<Nid>, TaxonomyError> {
        Ok(self
            .child_index()?
            .get(&concept)
            .cloned()
            .unwrap_or_default())
    }

    /// Returns `true` when `parent` is a visible direct parent of `child`.
    pub fn is_child_of(&self, child: Nid, parent: Nid) -> Result<bool, TaxonomyError> {
        Ok(self.record(child)?.is_some_and(|r| {
            r.contains_concept_nid_via_type(parent, self.is_a_nid, self.flags(), &self.calc)
        }))
    }

    /// Returns `true` when `ancestor` is `concept` or one of its ancestors.
    pub fn is_kind_of(&self, concept: Nid, ancestor: Nid) -> Result<bool, TaxonomyError> {
        if concept == ancestor {
            return Ok(true);
        }
        Ok(self.ancestors(concept)?.contains(&ancestor))
    }

    /// Transitive parents of `concept`.
    pub fn ancestors(&self, concept: Nid) -> Result<BTreeSet<Nid>, TaxonomyError> {
        closure(concept, |n| self.parents(n))
    }

    /// Transitive children of `concept`.
    pub fn descendants(&self, concept: Nid) -> Result<BTreeSet<Nid>, TaxonomyError> {
        closure(concept, |n| self.children(n))
    }

    /// Concepts with visible children but no visible parents, ascending.
    pub fn roots(&self) -> Result<Vec<Nid>, TaxonomyError> {
        let index = self.child_index()?;
        let has_parent: BTreeSet<Nid> = index.values().flatten().copied().collect();
        let mut roots: Vec<Nid> = index
            .keys()
            .filter(|p| !has_parent.contains(p))
            .copied()
            .collect();
        roots.sort_unstable();
        Ok(roots)
    }

    /// Visible statuses of `concept`. More than one member means the view
    /// is contradictory.
    pub fn concept_states(&self, concept: Nid) -> Result<StatusSet, TaxonomyError> {
        Ok(self
            .record(concept)?
            .map_or_else(StatusSet::empty, |r| r.concept_states(concept, &self.calc)))
    }

    /// Returns `true` when an active status version of `concept` is visible.
    pub fn is_concept_active(&self, concept: Nid) -> Result<bool, TaxonomyError> {
        Ok(self
            .record(concept)?
            .is_some_and(|r| r.is_concept_active(concept, &self.calc)))
    }

    /// Visible destinations of `concept` through `role_type`, ascending.
    pub fn role_destinations(
        &self,
        concept: Nid,
        role_type: Nid,
    ) -> Result<Vec<Nid>, TaxonomyError> {
        Ok(self
            .record(concept)?
            .map_or_else(Vec::new, |r| {
                r.concept_nids_for_type(role_type, self.flags(), &self.calc)
            }))
    }

    fn child_index(&self) -> Result<&FxHashMap<Nid, Vec<Nid>>, TaxonomyError> {
        if let Some(index) = self.children.get() {
            return Ok(index);
        }
        let built = self.build_child_index()?;
        Ok(self.children.get_or_init(|| built))
    }

    fn build_child_index(&self) -> Result<FxHashMap<Nid, Vec<Nid>>, TaxonomyError> {
        let flags = self.flags();
        let mut index: FxHashMap<Nid, Vec<Nid>> = FxHashMap::default();
        let mut scanned = 0_usize;
        for item in self.map.iter() {
            let (sequence, record) = item?;
            scanned += 1;
            let Some(child) = sequence_to_nid(sequence) else {
                continue;
            };
            for parent in record.concept_nids_for_type(self.is_a_nid, flags, &self.calc) {
                index.entry(parent).or_default().push(child);
            }
        }
        for children in index.values_mut() {
            children.sort_unstable();
        }
        debug!(scanned, parents = index.len(), "built child index");
        Ok(index)
    }
}

fn closure<F>(start: Nid, step: F) -> Result<BTreeSet<Nid>, TaxonomyError>
where
    F: Fn(Nid) -> Result<Vec<Nid>, TaxonomyError>,
{
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<Nid> = step(start)?.into();
    while let Some(next) = queue.pop_front() {
        if next == start || !seen.insert(next) {
            continue;
        }
        queue.extend(step(next)?);
    }
    Ok(seen)
}
