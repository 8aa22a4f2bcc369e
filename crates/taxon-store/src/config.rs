// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Store configuration and the config storage port.
//!
//! [`StoreConfig`] is a plain serde value. Persisting it (or any other config
//! blob) goes through [`ConfigService`], which serializes to JSON and delegates
//! raw byte storage to a [`ConfigStore`]. [`FsConfigStore`] keeps one JSON file
//! per key under a directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Slots per segment unless configured otherwise.
pub const DEFAULT_SEGMENT_SIZE: usize = 1280;
/// Striped write-sequence counters unless configured otherwise.
pub const DEFAULT_WRITE_SEQUENCE_STRIPES: usize = 256;
/// Resident segment budget unless configured otherwise.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Tunables for a [`WaitFreeMap`](crate::WaitFreeMap).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Slots per segment. Changing this for an existing directory makes the
    /// stored segments unreadable.
    pub segment_size: usize,
    /// Number of striped write-sequence counters.
    pub write_sequence_stripes: usize,
    /// Maximum number of segments kept resident before clean or flushed
    /// segments are evicted. Ignored for memory-only maps.
    pub cache_capacity: usize,
    /// Directory holding segment files. `None` keeps everything in memory.
    pub directory: Option<PathBuf>,
    /// File name prefix for segment files.
    pub file_prefix: String,
    /// Upper bound on compare-and-set attempts per `put`. `None` retries
    /// until the write lands.
    pub cas_retry_limit: Option<u32>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            write_sequence_stripes: DEFAULT_WRITE_SEQUENCE_STRIPES,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            directory: None,
            file_prefix: "segment-".to_owned(),
            cas_retry_limit: None,
        }
    }
}

impl StoreConfig {
    /// Memory-only configuration with default tunables.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Disk-backed configuration rooted at `directory`.
    pub fn on_disk(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            ..Self::default()
        }
    }

    /// Override the segment size.
    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size;
        self
    }

    /// Override the resident segment budget.
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Override the number of write-sequence stripes.
    pub fn with_write_sequence_stripes(mut self, stripes: usize) -> Self {
        self.write_sequence_stripes = stripes;
        self
    }

    /// Bound the compare-and-set loop.
    pub fn with_cas_retry_limit(mut self, limit: u32) -> Self {
        self.cas_retry_limit = Some(limit);
        self
    }

    /// Reject configurations the map cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segment_size == 0 {
            return Err(ConfigError::Invalid("segment_size must be > 0".into()));
        }
        if i32::try_from(self.segment_size).is_err() {
            return Err(ConfigError::Invalid(
                "segment_size must fit in a signed 32-bit length".into(),
            ));
        }
        if self.write_sequence_stripes == 0 {
            return Err(ConfigError::Invalid(
                "write_sequence_stripes must be > 0".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A value was decoded but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Thin service that serializes config values and delegates storage to a `ConfigStore`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load `key`, falling back to `T::default()` when it is missing.
    pub fn load_or_default<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.load(key)?.unwrap_or_default())
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// Store configs as JSON files under a base directory.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at `base`, creating the directory if needed.
    pub fn new(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}
