// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Relative position calculator: which stamped versions are visible from a
//! [`StampFilter`].
//!
//! A calculator is built once per filter. Construction walks the path
//! registry from the filter's position through every origin and records, per
//! reachable path, the latest time that is still part of the view (the
//! "route"). After that the calculator is immutable and may be shared across
//! reader threads.
//!
//! Visibility rules:
//!
//! 1. Canceled stamps, stamps off the route, and stamps from modules outside
//!    the filter's module list never participate.
//! 2. On one path, the later stamp wins.
//! 3. A stamp on a descendant path wins over a stamp on one of its origin
//!    paths, provided the descendant imported the origin at or after that
//!    stamp's time. An origin stamp made after the import, yet reached
//!    through another route, is unrelated to the descendant.
//! 4. Stamps on unrelated paths are incomparable under
//!    [`Precedence::Path`]; under [`Precedence::Time`] the later one wins.
//! 5. Stamps tied on path and time are separated by module priority when the
//!    filter lists modules.
//!
//! Whatever survives is the latest set. More than one member means the view
//! is contradictory, which is reported as data, not as an error. The
//! allowed-status policy is applied to the latest set, so an inactive version
//! hides the active version it superseded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::coordinate::{OriginBoundary, Precedence, StampFilter};
use crate::error::TaxonomyError;
use crate::ident::{Nid, StampSequence};
use crate::path::PathRegistry;
use crate::stamp::{Stamp, StampService, Status, StatusSet};

/// Ordering of two stamps as seen from one filter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RelativePosition {
    /// The first stamp is superseded by the second.
    Before,
    /// The first stamp supersedes the second.
    After,
    /// Same path and same time.
    Equal,
    /// Both visible and neither supersedes the other.
    Contradiction,
    /// At least one stamp is not part of the view.
    Unreachable,
}

/// Upper time bound of one route segment.
///
/// Field order gives the derived ordering: later end first, and at equal end
/// an inclusive bound is looser than an exclusive one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct Limit {
    end: i64,
    inclusive: bool,
}

impl Limit {
    const UNBOUNDED: Self = Self {
        end: i64::MAX,
        inclusive: true,
    };

    const fn admits(self, time: i64) -> bool {
        if self.inclusive {
            time <= self.end
        } else {
            time < self.end
        }
    }
}

/// Anything carrying a stamp, so that whole versions can be resolved.
pub trait StampedVersion {
    /// Stamp of this version.
    fn stamp_sequence(&self) -> StampSequence;
}

impl StampedVersion for StampSequence {
    fn stamp_sequence(&self) -> StampSequence {
        *self
    }
}

/// Visible version(s) of a multi-versioned value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatestVersion<V> {
    /// One visible version, if any.
    pub value: Option<V>,
    /// Further visible versions incomparable with `value`.
    pub contradictions: Vec<V>,
}

impl<V> LatestVersion<V> {
    /// Returns `true` when nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Returns `true` when more than one version is visible.
    pub fn is_contradicted(&self) -> bool {
        !self.contradictions.is_empty()
    }

    /// All visible versions.
    pub fn versions(&self) -> impl Iterator<Item = &V> {
        self.value.iter().chain(self.contradictions.iter())
    }
}

impl<V> Default for LatestVersion<V> {
    fn default() -> Self {
        Self {
            value: None,
            contradictions: Vec::new(),
        }
    }
}

/// One entry of a version history.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VersionMark {
    /// Stamp of the version.
    pub stamp: StampSequence,
    /// Status carried by the stamp.
    pub status: Status,
    /// Commit time of the stamp.
    pub time: i64,
    /// Whether the version is in the filter's latest set.
    pub latest: bool,
}

/// Visibility oracle for one [`StampFilter`].
pub struct RelativePositionCalculator {
    filter: StampFilter,
    route: FxHashMap<Nid, Limit>,
    ancestors: FxHashMap<Nid, FxHashMap<Nid, Limit>>,
    stamps: Arc<dyn StampService>,
}

impl std::fmt::Debug for RelativePositionCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelativePositionCalculator")
            .field("filter", &self.filter)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

impl RelativePositionCalculator {
    /// Build the calculator for `filter`, resolving its route through
    /// `paths`.
    pub fn new(
        filter: StampFilter,
        paths: &PathRegistry,
        stamps: Arc<dyn StampService>,
        boundary: OriginBoundary,
    ) -> Self {
        let start = Limit {
            end: filter.position.time,
            inclusive: true,
        };
        let route = reach(filter.position.path, start, paths, boundary);
        let ancestors = route
            .keys()
            .map(|p| (*p, ancestors_of(*p, paths, boundary)))
            .collect();
        debug!(
            path = filter.position.path,
            time = filter.position.time,
            route_len = route.len(),
            "built position calculator"
        );
        Self {
            filter,
            route,
            ancestors,
            stamps,
        }
    }

    /// Filter this calculator evaluates.
    pub fn filter(&self) -> &StampFilter {
        &self.filter
    }

    /// Stamp service used to resolve sequences.
    pub fn stamp_service(&self) -> &Arc<dyn StampService> {
        &self.stamps
    }

    /// Returns `true` when `stamp` lies on the filter's route: its path is
    /// reachable from the position and its time is within that path's
    /// segment. Canceled stamps are never on the route.
    pub fn on_route(&self, stamp: &Stamp) -> bool {
        stamp.status != Status::Canceled
            && self
                .route
                .get(&stamp.path)
                .is_some_and(|limit| limit.admits(stamp.time))
    }

    /// Order `a` relative to `b`.
    pub fn relative_position(
        &self,
        a: StampSequence,
        b: StampSequence,
    ) -> Result<RelativePosition, TaxonomyError> {
        let sa = self.stamps.stamp(a).ok_or(TaxonomyError::UnknownStamp(a))?;
        let sb = self.stamps.stamp(b).ok_or(TaxonomyError::UnknownStamp(b))?;
        if !self.on_route(&sa) || !self.on_route(&sb) {
            return Ok(RelativePosition::Unreachable);
        }
        Ok(self.compare(&sa, &sb))
    }

    /// Visible stamps among `stamps`. More than one member means the view is
    /// contradictory.
    pub fn latest_stamps<I>(&self, stamps: I) -> BTreeSet<StampSequence>
    where
        I: IntoIterator<Item = StampSequence>,
    {
        let candidates = self.candidates(stamps);
        self.latest_of(&candidates)
            .into_iter()
            .filter(|(_, s)| self.filter.allowed_states.allows(s.status))
            .map(|(seq, _)| seq)
            .collect()
    }

    /// Statuses of the visible stamps among `stamps`.
    pub fn latest_statuses<I>(&self, stamps: I) -> StatusSet
    where
        I: IntoIterator<Item = StampSequence>,
    {
        self.latest_stamps(stamps)
            .into_iter()
            .filter_map(|seq| self.stamps.stamp(seq))
            .map(|s| s.status)
            .collect()
    }

    /// Returns `true` when the visible set contains an active stamp.
    pub fn is_latest_active<I>(&self, stamps: I) -> bool
    where
        I: IntoIterator<Item = StampSequence>,
    {
        self.latest_statuses(stamps).allows(Status::Active)
    }

    /// Visible version(s) among `versions`.
    pub fn latest_version<V, I>(&self, versions: I) -> LatestVersion<V>
    where
        V: StampedVersion,
        I: IntoIterator<Item = V>,
    {
        let versions: Vec<V> = versions.into_iter().collect();
        let latest = self.latest_stamps(versions.iter().map(StampedVersion::stamp_sequence));
        let mut visible = versions
            .into_iter()
            .filter(|v| latest.contains(&v.stamp_sequence()));
        LatestVersion {
            value: visible.next(),
            contradictions: visible.collect(),
        }
    }

    /// Every participating stamp in time order, whatever its status, marked
    /// with membership in the latest set.
    pub fn history<I>(&self, stamps: I) -> Vec<VersionMark>
    where
        I: IntoIterator<Item = StampSequence>,
    {
        let candidates = self.candidates(stamps);
        let latest: BTreeSet<StampSequence> = self
            .latest_of(&candidates)
            .into_iter()
            .filter(|(_, s)| self.filter.allowed_states.allows(s.status))
            .map(|(seq, _)| seq)
            .collect();
        let mut marks: Vec<VersionMark> = candidates
            .into_iter()
            .map(|(seq, s)| VersionMark {
                stamp: seq,
                status: s.status,
                time: s.time,
                latest: latest.contains(&seq),
            })
            .collect();
        marks.sort_by_key(|m| (m.time, m.stamp));
        marks
    }

    /// Resolve, deduplicate and screen candidates.
    fn candidates<I>(&self, stamps: I) -> Vec<(StampSequence, Stamp)>
    where
        I: IntoIterator<Item = StampSequence>,
    {
        let mut resolved: BTreeMap<StampSequence, Stamp> = BTreeMap::new();
        for seq in stamps {
            if resolved.contains_key(&seq) {
                continue;
            }
            let Some(stamp) = self.stamps.stamp(seq) else {
                warn!(%seq, "skipping unknown stamp sequence");
                continue;
            };
            if self.on_route(&stamp) && self.filter.accepts_module(stamp.module) {
                resolved.insert(seq, stamp);
            }
        }
        resolved.into_iter().collect()
    }

    /// Maximal candidates, before status filtering.
    fn latest_of(&self, candidates: &[(StampSequence, Stamp)]) -> Vec<(StampSequence, Stamp)> {
        let mut newest: FxHashMap<Nid, i64> = FxHashMap::default();
        for (_, s) in candidates {
            newest
                .entry(s.path)
                .and_modify(|t| *t = (*t).max(s.time))
                .or_insert(s.time);
        }
        let heads: Vec<(StampSequence, Stamp)> = candidates
            .iter()
            .filter(|(_, s)| newest.get(&s.path) == Some(&s.time))
            .copied()
            .collect();

        let mut survivors: Vec<(StampSequence, Stamp)> = heads
            .iter()
            .filter(|(_, c)| {
                !heads
                    .iter()
                    .any(|(_, d)| self.compare(d, c) == RelativePosition::After)
            })
            .copied()
            .collect();

        if survivors.len() > 1 && !self.filter.modules.is_empty() {
            let tied = survivors.clone();
            survivors.retain(|(_, c)| {
                let rank = self.filter.module_rank(c.module);
                !tied.iter().any(|(_, d)| {
                    self.compare(d, c) == RelativePosition::Equal
                        && self.filter.module_rank(d.module) < rank
                })
            });
        }
        survivors
    }

    /// Order two on-route stamps.
    fn compare(&self, a: &Stamp, b: &Stamp) -> RelativePosition {
        if a.path == b.path {
            return match a.time.cmp(&b.time) {
                std::cmp::Ordering::Less => RelativePosition::Before,
                std::cmp::Ordering::Greater => RelativePosition::After,
                std::cmp::Ordering::Equal => RelativePosition::Equal,
            };
        }
        if self.imported(b, a.path) {
            return RelativePosition::After;
        }
        if self.imported(a, b.path) {
            return RelativePosition::Before;
        }
        match self.filter.precedence {
            Precedence::Path => RelativePosition::Contradiction,
            Precedence::Time => match a.time.cmp(&b.time) {
                std::cmp::Ordering::Less => RelativePosition::Before,
                std::cmp::Ordering::Greater => RelativePosition::After,
                std::cmp::Ordering::Equal => RelativePosition::Contradiction,
            },
        }
    }

    /// Returns `true` when `stamp` lies on an origin of `descendant` within
    /// the segment that `descendant` imported.
    fn imported(&self, stamp: &Stamp, descendant: Nid) -> bool {
        self.ancestors
            .get(&descendant)
            .and_then(|origins| origins.get(&stamp.path))
            .is_some_and(|limit| limit.admits(stamp.time))
    }
}

/// Paths reachable from `start` and the latest time visible on each.
///
/// An origin segment ends at the tighter of its import time and the end of
/// the segment that imported it. A path reached along several routes keeps
/// its loosest bound.
fn reach(
    start: Nid,
    start_limit: Limit,
    paths: &PathRegistry,
    boundary: OriginBoundary,
) -> FxHashMap<Nid, Limit> {
    let mut route: FxHashMap<Nid, Limit> = FxHashMap::default();
    route.insert(start, start_limit);

    let mut work = vec![start];
    while let Some(path) = work.pop() {
        let Some(limit) = route.get(&path).copied() else {
            continue;
        };
        for origin in paths.origins(path) {
            let import = Limit {
                end: origin.time,
                inclusive: boundary == OriginBoundary::Inclusive,
            };
            let bound = import.min(limit);
            if !route.get(&origin.path).is_some_and(|known| bound <= *known) {
                route.insert(origin.path, bound);
                work.push(origin.path);
            }
        }
    }
    route
}

/// Every transitive origin of `path` with the latest time `path` imported
/// from it.
fn ancestors_of(
    path: Nid,
    paths: &PathRegistry,
    boundary: OriginBoundary,
) -> FxHashMap<Nid, Limit> {
    let mut origins = reach(path, Limit::UNBOUNDED, paths, boundary);
    origins.remove(&path);
    origins
}
