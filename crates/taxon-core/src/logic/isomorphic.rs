// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bottom-up structural diff of two versions of one definition.
//!
//! Every node gets a blake3 digest of its semantic, payload, and child
//! digests. Commutative connectors sort their child digests first, so
//! reordering the conjuncts of an `And` does not change its digest.
//!
//! Matching starts at the two roots. Children with equal digests are common
//! as whole subtrees. Leftover connector children that agree on semantic and
//! payload are matched and compared recursively. Whatever remains is split
//! down through connectors until it reaches assertion-level nodes, which
//! become addition roots (current only) or deletion roots (previous only).

use blake3::Hasher;

use super::{LogicalExpression, NodeIndex, NodePayload, NodeSemantic};

/// 32-byte structural digest.
pub type Digest = [u8; 32];

/// Outcome of comparing a previous and a current definition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IsomorphicResults {
    /// Assertion-level nodes of the current version with no counterpart.
    pub addition_roots: Vec<NodeIndex>,
    /// Assertion-level nodes of the previous version with no counterpart.
    pub deletion_roots: Vec<NodeIndex>,
    /// Matched `(previous, current)` pairs. A pair matched by digest stands
    /// for its whole subtree.
    pub common_nodes: Vec<(NodeIndex, NodeIndex)>,
}

impl IsomorphicResults {
    /// Returns `true` when both versions are structurally equal.
    pub fn is_unchanged(&self) -> bool {
        self.addition_roots.is_empty() && self.deletion_roots.is_empty()
    }
}

/// Digest of every node, indexed like the arena.
pub fn structural_digests(expr: &LogicalExpression) -> Vec<Digest> {
    let mut digests: Vec<Digest> = Vec::with_capacity(expr.len());
    for node in expr.nodes() {
        let mut child_digests: Vec<Digest> = node
            .children()
            .iter()
            .filter_map(|c| digests.get(*c).copied())
            .collect();
        if node.semantic().is_commutative() {
            child_digests.sort_unstable();
        }
        let mut hasher = shell_hasher(node.semantic(), node.payload());
        hasher.update(&(child_digests.len() as u64).to_be_bytes());
        for d in &child_digests {
            hasher.update(d);
        }
        digests.push(*hasher.finalize().as_bytes());
    }
    digests
}

fn shell_hasher(semantic: NodeSemantic, payload: &NodePayload) -> Hasher {
    let mut hasher = Hasher::new();
    hasher.update(&[semantic.tag()]);
    match payload {
        NodePayload::None => {
            hasher.update(&[0]);
        }
        NodePayload::Concept(nid) => {
            hasher.update(&[1]);
            hasher.update(&nid.to_be_bytes());
        }
        NodePayload::Type(nid) => {
            hasher.update(&[2]);
            hasher.update(&nid.to_be_bytes());
        }
        NodePayload::Boolean(v) => {
            hasher.update(&[3, u8::from(*v)]);
        }
        NodePayload::Integer(v) => {
            hasher.update(&[4]);
            hasher.update(&v.to_be_bytes());
        }
        NodePayload::Text(s) => {
            hasher.update(&[5]);
            hasher.update(&(s.len() as u64).to_be_bytes());
            hasher.update(s.as_bytes());
        }
        NodePayload::Instant(v) => {
            hasher.update(&[6]);
            hasher.update(&v.to_be_bytes());
        }
    }
    hasher
}

struct Side<'a> {
    expr: &'a LogicalExpression,
    digests: Vec<Digest>,
}

impl Side<'_> {
    fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        match self.expr.node(index) {
            Some(node) => node.children(),
            None => &[],
        }
    }

    fn same_shell(&self, index: NodeIndex, other: &Self, other_index: NodeIndex) -> bool {
        match (self.expr.node(index), other.expr.node(other_index)) {
            (Some(a), Some(b)) => a.semantic() == b.semantic() && a.payload() == b.payload(),
            _ => false,
        }
    }

    fn is_connector(&self, index: NodeIndex) -> bool {
        self.expr
            .node(index)
            .is_some_and(|n| n.semantic().is_connector())
    }

    /// Push the assertion-level nodes under `index`.
    fn assertion_roots(&self, index: NodeIndex, out: &mut Vec<NodeIndex>) {
        if self.is_connector(index) {
            for &child in self.children(index) {
                self.assertion_roots(child, out);
            }
        } else {
            out.push(index);
        }
    }
}

/// Diff `current` against `previous`. With no previous version every
/// assertion of `current` is an addition.
pub fn isomorphic_analysis(
    previous: Option<&LogicalExpression>,
    current: &LogicalExpression,
) -> IsomorphicResults {
    let cur = Side {
        expr: current,
        digests: structural_digests(current),
    };
    let mut results = IsomorphicResults::default();

    let Some(previous) = previous else {
        cur.assertion_roots(current.root(), &mut results.addition_roots);
        return results;
    };
    let prev = Side {
        expr: previous,
        digests: structural_digests(previous),
    };

    let (p_root, c_root) = (previous.root(), current.root());
    if prev.digests.get(p_root) == cur.digests.get(c_root) {
        results.common_nodes.push((p_root, c_root));
    } else if prev.same_shell(p_root, &cur, c_root) {
        results.common_nodes.push((p_root, c_root));
        match_children(&prev, p_root, &cur, c_root, &mut results);
    } else {
        prev.assertion_roots(p_root, &mut results.deletion_roots);
        cur.assertion_roots(c_root, &mut results.addition_roots);
    }
    results
}

fn match_children(
    prev: &Side<'_>,
    p: NodeIndex,
    cur: &Side<'_>,
    c: NodeIndex,
    results: &mut IsomorphicResults,
) {
    let mut prev_left: Vec<NodeIndex> = prev.children(p).to_vec();
    let mut cur_left: Vec<NodeIndex> = Vec::new();

    for &cc in cur.children(c) {
        let digest = cur.digests.get(cc);
        if let Some(pos) = prev_left
            .iter()
            .position(|pc| prev.digests.get(*pc) == digest)
        {
            results.common_nodes.push((prev_left.remove(pos), cc));
        } else {
            cur_left.push(cc);
        }
    }

    let mut unmatched_cur: Vec<NodeIndex> = Vec::new();
    for cc in cur_left {
        let partner = if cur.is_connector(cc) {
            prev_left
                .iter()
                .position(|pc| prev.same_shell(*pc, cur, cc))
        } else {
            None
        };
        match partner {
            Some(pos) => {
                let pc = prev_left.remove(pos);
                results.common_nodes.push((pc, cc));
                match_children(prev, pc, cur, cc, results);
            }
            None => unmatched_cur.push(cc),
        }
    }

    for cc in unmatched_cur {
        cur.assertion_roots(cc, &mut results.addition_roots);
    }
    for pc in prev_left {
        prev.assertion_roots(pc, &mut results.deletion_roots);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parent_only(parent: i32) -> LogicalExpression {
        let mut b = LogicalExpression::builder();
        let c = b.concept(parent);
        let and = b.and(&[c]);
        let set = b.necessary(&[and]);
        b.build(&[set]).unwrap()
    }

    fn parent_and_role(parent: i32, role: i32, filler: i32, role_first: bool) -> LogicalExpression {
        let mut b = LogicalExpression::builder();
        let c = b.concept(parent);
        let f = b.concept(filler);
        let r = b.some_role(role, f);
        let and = if role_first { b.and(&[r, c]) } else { b.and(&[c, r]) };
        let set = b.necessary(&[and]);
        b.build(&[set]).unwrap()
    }

    #[test]
    fn reordered_conjuncts_share_a_digest() {
        let a = parent_and_role(7, 9, 5, false);
        let b = parent_and_role(7, 9, 5, true);
        assert_eq!(
            structural_digests(&a)[a.root()],
            structural_digests(&b)[b.root()]
        );
        assert!(isomorphic_analysis(Some(&a), &b).is_unchanged());
    }

    #[test]
    fn added_role_is_the_only_addition_root() {
        let previous = parent_only(7);
        let current = parent_and_role(7, 9, 5, false);
        let results = isomorphic_analysis(Some(&previous), &current);

        assert!(results.deletion_roots.is_empty());
        assert_eq!(results.addition_roots.len(), 1);
        let added = current.node(results.addition_roots[0]).unwrap();
        assert_eq!(added.semantic(), NodeSemantic::RoleSome);
        assert_eq!(added.type_nid(), Some(9));
    }

    #[test]
    fn changed_parent_is_one_deletion_and_one_addition() {
        let previous = parent_only(3);
        let current = parent_only(4);
        let results = isomorphic_analysis(Some(&previous), &current);
        assert_eq!(results.deletion_roots.len(), 1);
        assert_eq!(results.addition_roots.len(), 1);
        assert_eq!(
            previous.node(results.deletion_roots[0]).unwrap().concept_nid(),
            Some(3)
        );
        assert_eq!(
            current.node(results.addition_roots[0]).unwrap().concept_nid(),
            Some(4)
        );
    }

    #[test]
    fn first_version_adds_every_assertion() {
        let current = parent_and_role(7, 9, 5, false);
        let results = isomorphic_analysis(None, &current);
        assert_eq!(results.addition_roots.len(), 2);
        assert!(results.deletion_roots.is_empty());
        assert!(results.common_nodes.is_empty());
    }

    #[test]
    fn role_filler_change_replaces_the_whole_role() {
        let previous = parent_and_role(7, 9, 5, false);
        let current = parent_and_role(7, 9, 6, false);
        let results = isomorphic_analysis(Some(&previous), &current);
        let deleted = previous.node(results.deletion_roots[0]).unwrap();
        let added = current.node(results.addition_roots[0]).unwrap();
        assert_eq!(deleted.semantic(), NodeSemantic::RoleSome);
        assert_eq!(added.semantic(), NodeSemantic::RoleSome);
        assert_eq!(results.deletion_roots.len(), 1);
        assert_eq!(results.addition_roots.len(), 1);
    }
}
