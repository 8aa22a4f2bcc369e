// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Diff-driven taxonomy updates.
//!
//! Each committed definition version is diffed against its predecessor and
//! only the changed assertions turn into edge triples. Additions are stamped
//! with the commit stamp; deletions with the retired form of that stamp, so
//! the old edge remains in the record and is superseded rather than removed.
//! All triples for one update are accumulated into a single delta record and
//! written with one `put`.

use taxon_store::WaitFreeMap;
use tracing::{debug, instrument};

use crate::coordinate::PremiseType;
use crate::error::TaxonomyError;
use crate::ident::{nid_to_sequence, Nid, StampSequence};
use crate::logic::isomorphic::isomorphic_analysis;
use crate::logic::{LogicNode, LogicalExpression, NodeIndex, NodeSemantic};
use crate::stamp::StampService;
use crate::taxonomy::{TaxonomyFlags, TaxonomyRecord};

/// Edge counts produced by one update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Triples stamped with the commit stamp.
    pub additions: usize,
    /// Triples stamped with the retired stamp.
    pub retirements: usize,
}

impl UpdateSummary {
    /// Returns `true` when the update wrote nothing.
    pub fn is_empty(&self) -> bool {
        self.additions == 0 && self.retirements == 0
    }
}

/// Applies definition changes to a taxonomy map.
pub struct TaxonomyUpdater<'a> {
    map: &'a WaitFreeMap<TaxonomyRecord>,
    stamps: &'a dyn StampService,
    is_a_nid: Nid,
}

impl<'a> TaxonomyUpdater<'a> {
    /// Updater writing into `map`, recording parents under `is_a_nid`.
    pub fn new(
        map: &'a WaitFreeMap<TaxonomyRecord>,
        stamps: &'a dyn StampService,
        is_a_nid: Nid,
    ) -> Self {
        Self {
            map,
            stamps,
            is_a_nid,
        }
    }

    /// Record the edge changes between `previous` and `current` for
    /// `concept`.
    ///
    /// Fails without writing when a changed assertion has no taxonomy
    /// mapping.
    #[instrument(level = "debug", skip(self, previous, current), fields(first = previous.is_none()))]
    pub fn update(
        &self,
        concept: Nid,
        previous: Option<&LogicalExpression>,
        current: &LogicalExpression,
        stamp: StampSequence,
        premise: PremiseType,
    ) -> Result<UpdateSummary, TaxonomyError> {
        let key = nid_to_sequence(concept)?;
        self.resolve(stamp)?;
        let diff = isomorphic_analysis(previous, current);
        if diff.is_unchanged() {
            debug!("definition unchanged");
            return Ok(UpdateSummary::default());
        }

        let flags = premise.flags();
        let mut delta = TaxonomyRecord::new();
        let mut summary = UpdateSummary::default();

        for &root in &diff.addition_roots {
            summary.additions += self.emit(concept, current, root, stamp, flags, &mut delta)?;
        }
        if let Some(previous) = previous.filter(|_| !diff.deletion_roots.is_empty()) {
            let retired = self.stamps.retired_stamp(stamp)?;
            for &root in &diff.deletion_roots {
                summary.retirements +=
                    self.emit(concept, previous, root, retired, flags, &mut delta)?;
            }
        }

        if !delta.is_empty() {
            self.map.put(key, delta)?;
        }
        debug!(
            additions = summary.additions,
            retirements = summary.retirements,
            "taxonomy updated"
        );
        Ok(summary)
    }

    /// Record a status version of `concept`.
    pub fn update_concept_status(
        &self,
        concept: Nid,
        stamp: StampSequence,
    ) -> Result<(), TaxonomyError> {
        let key = nid_to_sequence(concept)?;
        self.resolve(stamp)?;
        let mut delta = TaxonomyRecord::new();
        delta.add_concept_status(concept, stamp);
        self.map.put(key, delta)?;
        Ok(())
    }

    fn resolve(&self, stamp: StampSequence) -> Result<(), TaxonomyError> {
        self.stamps
            .stamp(stamp)
            .map(|_| ())
            .ok_or(TaxonomyError::UnknownStamp(stamp))
    }

    /// Turn one assertion-level node into triples. Returns how many were
    /// added to `delta`.
    fn emit(
        &self,
        concept: Nid,
        expr: &LogicalExpression,
        index: NodeIndex,
        stamp: StampSequence,
        flags: TaxonomyFlags,
        delta: &mut TaxonomyRecord,
    ) -> Result<usize, TaxonomyError> {
        let node = expr.node(index).ok_or_else(|| {
            TaxonomyError::MalformedExpression(format!("node {index} is out of range"))
        })?;
        match node.semantic() {
            NodeSemantic::Concept => {
                let Some(parent) = node.concept_nid() else {
                    return Ok(0);
                };
                delta.add_stamp_record(parent, self.is_a_nid, stamp, flags);
                Ok(1)
            }
            NodeSemantic::RoleSome => {
                let role_type = role_type_of(node, index)?;
                let mut added = 0;
                for &child in node.children() {
                    added += role_edges(concept, expr, role_type, child, stamp, flags, delta)?;
                }
                Ok(added)
            }
            NodeSemantic::Feature => Ok(0),
            semantic => Err(TaxonomyError::UnsupportedConstruct { concept, semantic }),
        }
    }
}

fn role_type_of(node: &LogicNode, index: NodeIndex) -> Result<Nid, TaxonomyError> {
    node.type_nid().ok_or_else(|| {
        TaxonomyError::MalformedExpression(format!("role node {index} carries no role type"))
    })
}

/// Edges for the restriction under a role. Concepts become edges of
/// `role_type`; nested groups are walked; anything else is skipped.
fn role_edges(
    concept: Nid,
    expr: &LogicalExpression,
    role_type: Nid,
    index: NodeIndex,
    stamp: StampSequence,
    flags: TaxonomyFlags,
    delta: &mut TaxonomyRecord,
) -> Result<usize, TaxonomyError> {
    let Some(node) = expr.node(index) else {
        return Ok(0);
    };
    match node.semantic() {
        NodeSemantic::Concept => Ok(node.concept_nid().map_or(0, |destination| {
            delta.add_stamp_record(destination, role_type, stamp, flags);
            1
        })),
        NodeSemantic::And => node
            .children()
            .iter()
            .map(|&c| role_edges(concept, expr, role_type, c, stamp, flags, delta))
            .sum(),
        NodeSemantic::RoleSome => {
            let nested = role_type_of(node, index)?;
            node.children()
                .iter()
                .map(|&c| role_edges(concept, expr, nested, c, stamp, flags, delta))
                .sum()
        }
        semantic => {
            debug!(
                concept,
                ?semantic,
                role_type,
                "skipping role restriction with no taxonomy mapping"
            );
            Ok(0)
        }
    }
}
