// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Taxon core: versioned taxonomy storage and update engine.
//!
//! Every fact about a concept (its parents, its role relationships, its own
//! status) is recorded as a stamped edge triple and never deleted. What is
//! true "now" depends on the view: a [`StampFilter`] picks a path, a time, the
//! acceptable statuses, and module priorities, and the
//! [`RelativePositionCalculator`] decides which stamped versions that view
//! sees. When two incomparable versions are both visible the result carries
//! both, so conflicts between authors on different paths surface as data.
//!
//! # Key Types
//!
//! - [`Stamp`] / [`StampStore`]: interned version provenance.
//! - [`PathRegistry`]: edit branches and their origin DAG.
//! - [`RelativePositionCalculator`]: visibility and contradiction detection.
//! - [`TaxonomyRecord`]: per-concept, union-merged edge history, stored in a
//!   [`taxon_store::WaitFreeMap`].
//! - [`TaxonomyUpdater`]: turns definition diffs into edge deltas.
//! - [`Navigator`]: parent/child/ancestor queries for one
//!   [`ManifoldCoordinate`].
//! - [`TaxonomyEngine`]: the above wired together under one
//!   [`EngineConfig`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

pub mod config;
mod coordinate;
mod engine;
mod error;
mod ident;
pub mod logic;
mod navigator;
mod path;
mod position;
mod stamp;
pub mod taxonomy;
mod update;

pub use config::{EngineConfig, DEFAULT_IS_A_NID, ENGINE_CONFIG_KEY};
pub use coordinate::{
    ManifoldCoordinate, OriginBoundary, Precedence, PremiseType, StampFilter, StampPosition,
};
pub use engine::TaxonomyEngine;
pub use error::{RecordDecodeError, TaxonomyError};
pub use ident::{nid_to_sequence, sequence_to_nid, Nid, StampSequence};
pub use logic::isomorphic::{isomorphic_analysis, IsomorphicResults};
pub use logic::{LogicNode, LogicalExpression, LogicalExpressionBuilder, NodeIndex, NodeSemantic};
pub use navigator::Navigator;
pub use path::{PathOrigin, PathRegistry};
pub use position::{
    LatestVersion, RelativePosition, RelativePositionCalculator, StampedVersion, VersionMark,
};
pub use stamp::{Stamp, StampService, StampStore, Status, StatusSet};
pub use taxonomy::{EdgeTriple, TaxonomyFlags, TaxonomyRecord};
pub use update::{TaxonomyUpdater, UpdateSummary};
