// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine bundling the taxonomy map, stamp table, and path registry.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use taxon_store::WaitFreeMap;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::coordinate::{ManifoldCoordinate, StampFilter};
use crate::error::TaxonomyError;
use crate::ident::{nid_to_sequence, Nid};
use crate::navigator::Navigator;
use crate::path::{PathOrigin, PathRegistry};
use crate::position::RelativePositionCalculator;
use crate::stamp::{StampService, StampStore};
use crate::taxonomy::TaxonomyRecord;
use crate::update::TaxonomyUpdater;

/// One taxonomy database.
///
/// Memory-only unless the store configuration names a directory, in which
/// case [`flush`](Self::flush) writes dirty segments, the stamp table, and
/// the path registry, and [`open`](Self::open) reads them back.
#[derive(Debug)]
pub struct TaxonomyEngine {
    config: EngineConfig,
    map: Arc<WaitFreeMap<TaxonomyRecord>>,
    stamps: Arc<StampStore>,
    paths: RwLock<PathRegistry>,
}

impl TaxonomyEngine {
    /// Open (or create) an engine.
    pub fn open(config: EngineConfig) -> Result<Self, TaxonomyError> {
        config.validate()?;
        let map = Arc::new(WaitFreeMap::open(config.store.clone())?);

        let (stamps, paths) = match Self::side_files(&config) {
            Some((stamp_file, path_file)) => {
                let stamps = if stamp_file.exists() {
                    StampStore::load(&stamp_file)?
                } else {
                    StampStore::new()
                };
                let paths = if path_file.exists() {
                    PathRegistry::load(&path_file)?
                } else {
                    PathRegistry::new()
                };
                (stamps, paths)
            }
            None => (StampStore::new(), PathRegistry::new()),
        };
        info!(
            stamps = stamps.len(),
            segments = map.segment_count(),
            "opened taxonomy engine"
        );
        Ok(Self {
            config,
            map,
            stamps: Arc::new(stamps),
            paths: RwLock::new(paths),
        })
    }

    fn side_files(config: &EngineConfig) -> Option<(PathBuf, PathBuf)> {
        config
            .store
            .directory
            .as_ref()
            .map(|dir| (dir.join(&config.stamp_file), dir.join(&config.path_file)))
    }

    /// Configuration the engine was opened with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared taxonomy map.
    pub fn map(&self) -> &Arc<WaitFreeMap<TaxonomyRecord>> {
        &self.map
    }

    /// Shared stamp table.
    pub fn stamps(&self) -> &Arc<StampStore> {
        &self.stamps
    }

    /// Register `path` with its origins, replacing any earlier registration.
    pub fn add_path(&self, path: Nid, origins: impl IntoIterator<Item = PathOrigin>) {
        self.paths.write().add_path(path, origins);
    }

    /// Snapshot of the path registry.
    pub fn paths(&self) -> PathRegistry {
        self.paths.read().clone()
    }

    /// Updater writing into this engine's map.
    pub fn updater(&self) -> TaxonomyUpdater<'_> {
        TaxonomyUpdater::new(&self.map, self.stamps.as_ref(), self.config.is_a_nid)
    }

    /// Calculator for `filter` over the current path registry.
    pub fn calculator(&self, filter: StampFilter) -> RelativePositionCalculator {
        RelativePositionCalculator::new(
            filter,
            &self.paths.read(),
            self.stamp_service(),
            self.config.origin_boundary,
        )
    }

    /// Navigator for `coordinate` over the current path registry.
    pub fn navigator(&self, coordinate: ManifoldCoordinate) -> Navigator {
        Navigator::new(
            coordinate,
            self.config.is_a_nid,
            Arc::clone(&self.map),
            &self.paths.read(),
            self.stamp_service(),
            self.config.origin_boundary,
        )
    }

    /// Stored record of `concept`, if any.
    pub fn record(&self, concept: Nid) -> Result<Option<TaxonomyRecord>, TaxonomyError> {
        Ok(self.map.get(nid_to_sequence(concept)?)?)
    }

    /// Persist dirty segments and side tables. No-op when memory-only.
    pub fn flush(&self) -> Result<(), TaxonomyError> {
        self.map.flush()?;
        if let Some((stamp_file, path_file)) = Self::side_files(&self.config) {
            self.stamps.save(&stamp_file)?;
            self.paths.read().save(&path_file)?;
            debug!(stamps = self.stamps.len(), "flushed taxonomy engine");
        }
        Ok(())
    }

    fn stamp_service(&self) -> Arc<dyn StampService> {
        self.stamps.clone()
    }
}
