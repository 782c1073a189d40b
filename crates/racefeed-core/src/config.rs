//! Feed configuration.
//!
//! `FeedConfig` is handed to the orchestrator explicitly. It can be built in
//! code, or layered from (lowest to highest priority) defaults, an optional
//! JSON settings file and environment variables.
//!
//! The settings file lives at `~/.config/racefeed/config.json` (platform
//! equivalent) unless a path is given.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{CredentialKind, EntityType};

/// Application name used for the settings directory
const APP_NAME: &str = "racefeed";

/// Settings file name
const SETTINGS_FILE: &str = "config.json";

pub const DEFAULT_BASE_URL: &str = "https://www.gmaxequine.com/TPD/client";

/// Worker pool size for bulk fetches. The provider rate-limits bursts.
pub const DEFAULT_CONCURRENCY: usize = 6;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

pub const LICENCE_ENV: &str = "GMAXLICENCE";
pub const ALT_LICENCE_ENV: &str = "ALTLICENCE";
pub const BASE_URL_ENV: &str = "GMAX_BASE_URL";
pub const CACHE_ROOT_ENV: &str = "RACEFEED_CACHE_ROOT";

/// Optional settings as read from the JSON settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub licence: Option<String>,
    pub alt_licence: Option<String>,
    pub base_url: Option<String>,
    pub cache_root: Option<PathBuf>,
    /// Directory overrides keyed by entity label (`"sectionals-raw"`).
    pub dirs: BTreeMap<String, PathBuf>,
    pub concurrency: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl FeedSettings {
    /// Load from the default location; a missing file yields empty settings.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(SETTINGS_FILE))
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    licence: String,
    pub alt_licence: Option<String>,
    pub base_url: String,
    pub dirs: BTreeMap<EntityType, PathBuf>,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl FeedConfig {
    /// Defaults with every cache directory under the current directory.
    pub fn new(licence: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_cache_root(licence, ".")
    }

    /// Defaults with every cache directory under `root`.
    pub fn with_cache_root(
        licence: impl Into<String>,
        root: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let licence = licence.into();
        if licence.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(Self {
            licence,
            alt_licence: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            dirs: default_dirs(root.as_ref()),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        })
    }

    /// Build from the process environment layered over the settings file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = FeedSettings::load()?;
        Self::from_sources(settings, |name| std::env::var(name).ok())
    }

    /// Layer environment values (looked up through `env`) over `settings`.
    pub fn from_sources<F>(settings: FeedSettings, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let licence = lookup(LICENCE_ENV)
            .or(settings.licence)
            .ok_or(ConfigError::MissingCredential)?;
        let root = lookup(CACHE_ROOT_ENV)
            .map(PathBuf::from)
            .or(settings.cache_root)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = Self::with_cache_root(licence, &root)?;
        config.alt_licence = lookup(ALT_LICENCE_ENV).or(settings.alt_licence);
        if let Some(base_url) = lookup(BASE_URL_ENV).or(settings.base_url) {
            config.base_url = base_url;
        }
        for (label, dir) in settings.dirs {
            let entity = label
                .parse::<EntityType>()
                .map_err(|e| ConfigError::InvalidValue {
                    name: "dirs".to_string(),
                    reason: e.to_string(),
                })?;
            config.dirs.insert(entity, dir);
        }
        for entity in EntityType::ALL {
            if let Some(dir) = lookup(entity.dir_env_var()) {
                config.dirs.insert(entity, PathBuf::from(dir));
            }
        }
        if let Some(concurrency) = settings.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(secs) = settings.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = settings.max_attempts {
            config.max_attempts = attempts;
        }
        if let Some(ms) = settings.retry_delay_ms {
            config.retry_delay = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.licence.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn licence(&self) -> &str {
        &self.licence
    }

    /// Credential for an entity type; `None` if it is not configured.
    pub fn credential(&self, kind: CredentialKind) -> Option<&str> {
        match kind {
            CredentialKind::Licence => Some(self.licence.as_str()),
            CredentialKind::AltLicence => self.alt_licence.as_deref(),
        }
    }

    pub fn dir(&self, entity: EntityType) -> PathBuf {
        self.dirs
            .get(&entity)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(entity.default_dir()))
    }
}

fn default_dirs(root: &Path) -> BTreeMap<EntityType, PathBuf> {
    EntityType::ALL
        .iter()
        .map(|entity| (*entity, root.join(entity.default_dir())))
        .collect()
}
