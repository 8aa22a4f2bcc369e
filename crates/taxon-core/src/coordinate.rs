// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! View coordinates: stamp positions, stamp filters, and manifold coordinates.
//!
//! All types here are immutable values, cheap to clone and safe to share
//! across threads.

use serde::{Deserialize, Serialize};

use crate::ident::Nid;
use crate::stamp::{Stamp, StatusSet};
use crate::taxonomy::TaxonomyFlags;

/// A point on one path's timeline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct StampPosition {
    /// Path the view is anchored on.
    pub path: Nid,
    /// Inclusive upper bound on visible stamp times.
    pub time: i64,
}

impl StampPosition {
    /// Position at `time` on `path`.
    pub const fn new(path: Nid, time: i64) -> Self {
        Self { path, time }
    }

    /// Position that sees every committed and uncommitted stamp on `path`.
    pub const fn latest(path: Nid) -> Self {
        Self {
            path,
            time: Stamp::UNCOMMITTED_TIME,
        }
    }
}

/// How stamps on unrelated paths are ordered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Precedence {
    /// Stamps on paths with no ancestor relationship are incomparable.
    #[default]
    Path,
    /// Stamps on unrelated paths are ordered by time; equal times remain
    /// incomparable.
    Time,
}

/// Whether an origin's import time itself is part of the inherited history.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum OriginBoundary {
    /// A stamp at exactly the import time is inherited.
    #[default]
    Inclusive,
    /// Only stamps strictly before the import time are inherited.
    Exclusive,
}

/// Query-time visibility policy.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct StampFilter {
    /// Path and time the view is anchored at.
    pub position: StampPosition,
    /// Statuses a visible version may carry.
    pub allowed_states: StatusSet,
    /// Acceptable modules in priority order. Empty accepts every module.
    pub modules: Vec<Nid>,
    /// Ordering rule for stamps on unrelated paths.
    pub precedence: Precedence,
}

impl StampFilter {
    /// Filter at `position` showing active versions from every module.
    pub fn new(position: StampPosition) -> Self {
        Self {
            position,
            allowed_states: StatusSet::ACTIVE_ONLY,
            modules: Vec::new(),
            precedence: Precedence::Path,
        }
    }

    /// Latest position on `path`, active versions only.
    pub fn latest_active(path: Nid) -> Self {
        Self::new(StampPosition::latest(path))
    }

    /// Replace the allowed statuses.
    pub fn with_allowed_states(mut self, allowed: StatusSet) -> Self {
        self.allowed_states = allowed;
        self
    }

    /// Replace the module priority list.
    pub fn with_modules(mut self, modules: impl IntoIterator<Item = Nid>) -> Self {
        self.modules = modules.into_iter().collect();
        self
    }

    /// Replace the precedence rule.
    pub fn with_precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Same filter anchored at another time on the same path.
    pub fn at_time(mut self, time: i64) -> Self {
        self.position.time = time;
        self
    }

    /// Returns `true` if `module` passes the module list.
    pub fn accepts_module(&self, module: Nid) -> bool {
        self.modules.is_empty() || self.modules.contains(&module)
    }

    /// Tie-break rank of `module`; lower wins. `None` when no list is set.
    pub fn module_rank(&self, module: Nid) -> Option<usize> {
        self.modules.iter().position(|m| *m == module)
    }
}

/// Which logical form a taxonomy view reads.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum PremiseType {
    /// Author-asserted definitions.
    Stated,
    /// Classifier output.
    #[default]
    Inferred,
}

impl PremiseType {
    /// Taxonomy flag marking edges derived from this form.
    pub const fn flags(self) -> TaxonomyFlags {
        match self {
            Self::Stated => TaxonomyFlags::STATED,
            Self::Inferred => TaxonomyFlags::INFERRED,
        }
    }
}

/// One fixed, navigable view of the taxonomy.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ManifoldCoordinate {
    /// Visibility policy.
    pub filter: StampFilter,
    /// Stated or inferred form.
    pub premise: PremiseType,
}

impl ManifoldCoordinate {
    /// Construct a coordinate.
    pub fn new(filter: StampFilter, premise: PremiseType) -> Self {
        Self { filter, premise }
    }

    /// Inferred view at the latest position on `path`, active only.
    pub fn inferred_latest(path: Nid) -> Self {
        Self::new(StampFilter::latest_active(path), PremiseType::Inferred)
    }

    /// Stated view at the latest position on `path`, active only.
    pub fn stated_latest(path: Nid) -> Self {
        Self::new(StampFilter::latest_active(path), PremiseType::Stated)
    }
}
