// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Paths: named edit branches and their origin DAG.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::error::TaxonomyError;
use crate::ident::Nid;

/// Point at which a path imported the history of another path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct PathOrigin {
    /// Path whose history is inherited.
    pub path: Nid,
    /// Import time on the origin path (epoch ms).
    pub time: i64,
}

impl PathOrigin {
    /// Construct an origin.
    pub const fn new(path: Nid, time: i64) -> Self {
        Self { path, time }
    }
}

/// Registry of known paths and their origins.
///
/// Paths absent from the registry are treated as roots with no origins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRegistry {
    origins: BTreeMap<Nid, Vec<PathOrigin>>,
}

impl PathRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) `path` with the given origins.
    pub fn add_path(&mut self, path: Nid, origins: impl IntoIterator<Item = PathOrigin>) {
        self.origins.insert(path, origins.into_iter().collect());
    }

    /// Origins of `path` (empty for roots and unknown paths).
    pub fn origins(&self, path: Nid) -> &[PathOrigin] {
        match self.origins.get(&path) {
            Some(origins) => origins,
            None => &[],
        }
    }

    /// Returns `true` if `path` has been registered.
    pub fn contains(&self, path: Nid) -> bool {
        self.origins.contains_key(&path)
    }

    /// Returns `true` when `candidate` is reachable from `of` through one or
    /// more origin links.
    pub fn is_ancestor(&self, candidate: Nid, of: Nid) -> bool {
        let mut stack: Vec<Nid> = self.origins(of).iter().map(|o| o.path).collect();
        let mut seen: Vec<Nid> = Vec::new();
        while let Some(p) = stack.pop() {
            if p == candidate {
                return true;
            }
            if seen.contains(&p) {
                continue;
            }
            seen.push(p);
            stack.extend(self.origins(p).iter().map(|o| o.path));
        }
        false
    }

    /// Persist the registry as JSON.
    pub fn save(&self, path: &FsPath) -> Result<(), TaxonomyError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a registry written by [`save`](Self::save).
    pub fn load(path: &FsPath) -> Result<Self, TaxonomyError> {
        let bytes = fs::read(path).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
