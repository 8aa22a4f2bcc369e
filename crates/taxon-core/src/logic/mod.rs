// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rooted logical definitions of concepts.
//!
//! A [`LogicalExpression`] is an arena of [`LogicNode`]s. Children always
//! precede their parent in the arena and every node except the root has
//! exactly one parent, so a single forward pass visits the tree bottom-up.
//! Expressions are produced by the logic-graph builder collaborator; inside
//! this crate they are read-only input to the diff in [`isomorphic`].

pub mod isomorphic;

use serde::{Deserialize, Serialize};

use crate::error::TaxonomyError;
use crate::ident::Nid;

/// Arena index of a node.
pub type NodeIndex = usize;

/// Node vocabulary shared by stated and inferred forms.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum NodeSemantic {
    /// Root of a definition; children are necessary/sufficient sets.
    DefinitionRoot,
    /// Conditions every instance satisfies.
    NecessarySet,
    /// Conditions that together define the concept.
    SufficientSet,
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
    /// Disjointness axiom.
    DisjointWith,
    /// Reference to a concept.
    Concept,
    /// Existential role restriction.
    RoleSome,
    /// Universal role restriction.
    RoleAll,
    /// Concrete-domain feature.
    Feature,
    /// Boolean literal.
    LiteralBoolean,
    /// Integer literal.
    LiteralInteger,
    /// String literal.
    LiteralString,
    /// Instant literal (epoch ms).
    LiteralInstant,
}

impl NodeSemantic {
    /// Children may be reordered without changing meaning.
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::DefinitionRoot
                | Self::NecessarySet
                | Self::SufficientSet
                | Self::And
                | Self::Or
                | Self::DisjointWith
        )
    }

    /// Grouping node whose children are independent assertions.
    pub const fn is_connector(self) -> bool {
        matches!(
            self,
            Self::DefinitionRoot | Self::NecessarySet | Self::SufficientSet | Self::And
        )
    }

    const fn tag(self) -> u8 {
        match self {
            Self::DefinitionRoot => 0,
            Self::NecessarySet => 1,
            Self::SufficientSet => 2,
            Self::And => 3,
            Self::Or => 4,
            Self::DisjointWith => 5,
            Self::Concept => 6,
            Self::RoleSome => 7,
            Self::RoleAll => 8,
            Self::Feature => 9,
            Self::LiteralBoolean => 10,
            Self::LiteralInteger => 11,
            Self::LiteralString => 12,
            Self::LiteralInstant => 13,
        }
    }
}

/// Semantic-specific data of a node.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum NodePayload {
    /// Connectors carry nothing.
    None,
    /// Referenced concept.
    Concept(Nid),
    /// Role or feature type.
    Type(Nid),
    /// Boolean literal.
    Boolean(bool),
    /// Integer literal.
    Integer(i64),
    /// String literal.
    Text(String),
    /// Instant literal.
    Instant(i64),
}

/// One node of a [`LogicalExpression`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LogicNode {
    semantic: NodeSemantic,
    payload: NodePayload,
    children: Vec<NodeIndex>,
}

impl LogicNode {
    /// Node semantic.
    pub fn semantic(&self) -> NodeSemantic {
        self.semantic
    }

    /// Semantic-specific data.
    pub fn payload(&self) -> &NodePayload {
        &self.payload
    }

    /// Child indices in authored order.
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    /// Concept referenced by a [`NodeSemantic::Concept`] node.
    pub fn concept_nid(&self) -> Option<Nid> {
        match self.payload {
            NodePayload::Concept(nid) => Some(nid),
            _ => None,
        }
    }

    /// Type of a role or feature node.
    pub fn type_nid(&self) -> Option<Nid> {
        match self.payload {
            NodePayload::Type(nid) => Some(nid),
            _ => None,
        }
    }
}

/// Read-only rooted definition tree.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LogicalExpression {
    nodes: Vec<LogicNode>,
    root: NodeIndex,
}

impl LogicalExpression {
    /// Start building an expression.
    pub fn builder() -> LogicalExpressionBuilder {
        LogicalExpressionBuilder::default()
    }

    /// Index of the definition root.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Node at `index`.
    pub fn node(&self, index: NodeIndex) -> Option<&LogicNode> {
        self.nodes.get(index)
    }

    /// All nodes, children before parents.
    pub fn nodes(&self) -> &[LogicNode] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false` for a built expression; provided for completeness.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Bottom-up builder for [`LogicalExpression`].
///
/// Each method appends one node and returns its index; pass those indices as
/// children of later nodes, then call [`build`](Self::build).
#[derive(Clone, Debug, Default)]
pub struct LogicalExpressionBuilder {
    nodes: Vec<LogicNode>,
}

impl LogicalExpressionBuilder {
    fn push(
        &mut self,
        semantic: NodeSemantic,
        payload: NodePayload,
        children: Vec<NodeIndex>,
    ) -> NodeIndex {
        self.nodes.push(LogicNode {
            semantic,
            payload,
            children,
        });
        self.nodes.len() - 1
    }

    /// Necessary set over `children`.
    pub fn necessary(&mut self, children: &[NodeIndex]) -> NodeIndex {
        self.push(NodeSemantic::NecessarySet, NodePayload::None, children.to_vec())
    }

    /// Sufficient set over `children`.
    pub fn sufficient(&mut self, children: &[NodeIndex]) -> NodeIndex {
        self.push(NodeSemantic::SufficientSet, NodePayload::None, children.to_vec())
    }

    /// Conjunction of `children`.
    pub fn and(&mut self, children: &[NodeIndex]) -> NodeIndex {
        self.push(NodeSemantic::And, NodePayload::None, children.to_vec())
    }

    /// Disjunction of `children`.
    pub fn or(&mut self, children: &[NodeIndex]) -> NodeIndex {
        self.push(NodeSemantic::Or, NodePayload::None, children.to_vec())
    }

    /// Disjointness of `children`.
    pub fn disjoint_with(&mut self, children: &[NodeIndex]) -> NodeIndex {
        self.push(NodeSemantic::DisjointWith, NodePayload::None, children.to_vec())
    }

    /// Reference to `concept`.
    pub fn concept(&mut self, concept: Nid) -> NodeIndex {
        self.push(NodeSemantic::Concept, NodePayload::Concept(concept), Vec::new())
    }

    /// `∃ role_type . restriction`.
    pub fn some_role(&mut self, role_type: Nid, restriction: NodeIndex) -> NodeIndex {
        self.push(
            NodeSemantic::RoleSome,
            NodePayload::Type(role_type),
            vec![restriction],
        )
    }

    /// `∀ role_type . restriction`.
    pub fn all_role(&mut self, role_type: Nid, restriction: NodeIndex) -> NodeIndex {
        self.push(
            NodeSemantic::RoleAll,
            NodePayload::Type(role_type),
            vec![restriction],
        )
    }

    /// Feature of `feature_type` bound to a literal.
    pub fn feature(&mut self, feature_type: Nid, literal: NodeIndex) -> NodeIndex {
        self.push(
            NodeSemantic::Feature,
            NodePayload::Type(feature_type),
            vec![literal],
        )
    }

    /// Boolean literal.
    pub fn boolean(&mut self, value: bool) -> NodeIndex {
        self.push(NodeSemantic::LiteralBoolean, NodePayload::Boolean(value), Vec::new())
    }

    /// Integer literal.
    pub fn integer(&mut self, value: i64) -> NodeIndex {
        self.push(NodeSemantic::LiteralInteger, NodePayload::Integer(value), Vec::new())
    }

    /// String literal.
    pub fn string(&mut self, value: impl Into<String>) -> NodeIndex {
        self.push(NodeSemantic::LiteralString, NodePayload::Text(value.into()), Vec::new())
    }

    /// Instant literal.
    pub fn instant(&mut self, epoch_ms: i64) -> NodeIndex {
        self.push(NodeSemantic::LiteralInstant, NodePayload::Instant(epoch_ms), Vec::new())
    }

    /// Close the expression under a definition root over `sets`.
    ///
    /// Fails when a node names a child that does not precede it, a node has
    /// two parents, a restriction does not have exactly one child, a leaf has
    /// children, or a node is left unattached.
    pub fn build(mut self, sets: &[NodeIndex]) -> Result<LogicalExpression, TaxonomyError> {
        let root = self.push(NodeSemantic::DefinitionRoot, NodePayload::None, sets.to_vec());
        let mut parent_count = vec![0_u8; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            let arity_ok = match node.semantic {
                NodeSemantic::RoleSome | NodeSemantic::RoleAll | NodeSemantic::Feature => {
                    node.children.len() == 1
                }
                NodeSemantic::Concept
                | NodeSemantic::LiteralBoolean
                | NodeSemantic::LiteralInteger
                | NodeSemantic::LiteralString
                | NodeSemantic::LiteralInstant => node.children.is_empty(),
                _ => true,
            };
            if !arity_ok {
                return Err(TaxonomyError::MalformedExpression(format!(
                    "node {index} ({:?}) has {} children",
                    node.semantic,
                    node.children.len()
                )));
            }
            for &child in &node.children {
                if child >= index {
                    return Err(TaxonomyError::MalformedExpression(format!(
                        "node {index} refers to child {child} that does not precede it"
                    )));
                }
                parent_count[child] += 1;
                if parent_count[child] > 1 {
                    return Err(TaxonomyError::MalformedExpression(format!(
                        "node {child} has more than one parent"
                    )));
                }
            }
        }
        if let Some(orphan) = parent_count[..root].iter().position(|c| *c == 0) {
            return Err(TaxonomyError::MalformedExpression(format!(
                "node {orphan} is not attached to the root"
            )));
        }
        Ok(LogicalExpression {
            nodes: self.nodes,
            root,
        })
    }
}
