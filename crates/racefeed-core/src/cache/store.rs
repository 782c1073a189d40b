use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::StoreError;
use crate::models::{EntityType, Payload, PayloadTransform};

/// Summary of one entity type's cache directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub entries: usize,
    pub newest: Option<DateTime<Utc>>,
}

/// File-backed store: one directory per entity type, one file per key.
///
/// Route geometry is kept as raw text, everything else as JSON. The file's
/// modification time is the only freshness signal; there is no sidecar.
#[derive(Debug, Clone)]
pub struct EntityStore {
    dirs: BTreeMap<EntityType, PathBuf>,
}

impl EntityStore {
    pub fn new(config: &FeedConfig) -> Self {
        let dirs = EntityType::ALL
            .iter()
            .map(|entity| (*entity, config.dir(*entity)))
            .collect();
        Self { dirs }
    }

    /// Every entity type under `root`, using the default directory names.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let dirs = EntityType::ALL
            .iter()
            .map(|entity| (*entity, root.join(entity.default_dir())))
            .collect();
        Self { dirs }
    }

    pub fn dir(&self, entity: EntityType) -> PathBuf {
        self.dirs
            .get(&entity)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(entity.default_dir()))
    }

    pub fn path(&self, entity: EntityType, key: &str) -> PathBuf {
        self.dir(entity).join(entity.file_name(key))
    }

    pub fn exists(&self, entity: EntityType, key: &str) -> bool {
        self.path(entity, key).is_file()
    }

    /// Last-modified time of the cache entry, `None` if there is no entry.
    pub fn modified(&self, entity: EntityType, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let path = self.path(entity, key);
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let modified = metadata
            .modified()
            .map_err(|source| StoreError::Io { path, source })?;
        Ok(Some(DateTime::<Utc>::from(modified)))
    }

    pub fn load(&self, entity: EntityType, key: &str) -> Result<Option<Payload>, StoreError> {
        let path = self.path(entity, key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        let payload = match entity.transform() {
            PayloadTransform::RawTextUnlessSentinel => Payload::Text(contents),
            _ => {
                let value: Value = serde_json::from_str(&contents)
                    .map_err(|source| StoreError::Decode { path, source })?;
                Payload::Records(value)
            }
        };
        Ok(Some(payload))
    }

    /// Write a payload, creating the entity's directory on first use.
    pub fn save(&self, entity: EntityType, key: &str, payload: &Payload) -> Result<(), StoreError> {
        let dir = self.dir(entity);
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            debug!(entity = %entity, dir = %dir.display(), "Created cache directory");
        }

        let path = self.path(entity, key);
        let contents = match payload {
            Payload::Text(text) => text.clone(),
            Payload::Records(value) => serde_json::to_string(value).map_err(|source| {
                StoreError::Encode {
                    path: path.clone(),
                    source,
                }
            })?,
        };
        std::fs::write(&path, contents).map_err(|source| StoreError::Io { path, source })
    }

    /// Keys with a cache entry, hidden files excluded. Sorted.
    pub fn keys(&self, entity: EntityType) -> Result<Vec<String>, StoreError> {
        let dir = self.dir(entity);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_file() {
                continue;
            }
            if let Some(key) = entity.key_from_file_name(&name) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn stats(&self, entity: EntityType) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for key in self.keys(entity)? {
            stats.entries += 1;
            if let Some(modified) = self.modified(entity, &key)? {
                stats.newest = Some(stats.newest.map_or(modified, |n| n.max(modified)));
            }
        }
        Ok(stats)
    }
}

// ============================================================================
// Tests
// ============================================================================
