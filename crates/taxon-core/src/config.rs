// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine configuration.
//!
//! Loaded and saved through the same [`ConfigService`] port as the store
//! configuration, under [`ENGINE_CONFIG_KEY`].

use serde::{Deserialize, Serialize};
use taxon_store::{ConfigError, ConfigService, ConfigStore, StoreConfig};

use crate::coordinate::OriginBoundary;
use crate::ident::Nid;

/// Config key the engine configuration is stored under.
pub const ENGINE_CONFIG_KEY: &str = "taxon-engine";

/// IS-A relationship type used when none is configured.
pub const DEFAULT_IS_A_NID: Nid = 1;

/// Tunables for a [`TaxonomyEngine`](crate::TaxonomyEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Taxonomy map storage.
    pub store: StoreConfig,
    /// Relationship type recorded for parent (IS-A) edges.
    pub is_a_nid: Nid,
    /// Whether stamps at exactly an origin's import time are inherited.
    pub origin_boundary: OriginBoundary,
    /// File name of the persisted stamp table, relative to the store
    /// directory.
    pub stamp_file: String,
    /// File name of the persisted path registry, relative to the store
    /// directory.
    pub path_file: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            is_a_nid: DEFAULT_IS_A_NID,
            origin_boundary: OriginBoundary::Inclusive,
            stamp_file: "stamps.json".to_owned(),
            path_file: "paths.json".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Memory-only engine.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Engine persisting under `directory`.
    pub fn on_disk(directory: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: StoreConfig::on_disk(directory),
            ..Self::default()
        }
    }

    /// Replace the store configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Override the IS-A relationship type.
    pub fn with_is_a_nid(mut self, is_a_nid: Nid) -> Self {
        self.is_a_nid = is_a_nid;
        self
    }

    /// Override the origin boundary rule.
    pub fn with_origin_boundary(mut self, boundary: OriginBoundary) -> Self {
        self.origin_boundary = boundary;
        self
    }

    /// Reject configurations the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        if self.is_a_nid < 0 {
            return Err(ConfigError::Invalid(format!(
                "is_a_nid {} is unassigned",
                self.is_a_nid
            )));
        }
        if self.stamp_file.is_empty() || self.path_file.is_empty() {
            return Err(ConfigError::Invalid(
                "stamp_file and path_file must be non-empty".into(),
            ));
        }
        Ok(())
    }

    /// Load from `service`, falling back to defaults when absent.
    pub fn load<S: ConfigStore>(service: &ConfigService<S>) -> Result<Self, ConfigError> {
        let config: Self = service.load_or_default(ENGINE_CONFIG_KEY)?;
        config.validate()?;
        Ok(config)
    }

    /// Persist through `service`.
    pub fn save<S: ConfigStore>(&self, service: &ConfigService<S>) -> Result<(), ConfigError> {
        service.save(ENGINE_CONFIG_KEY, self)
    }
}
