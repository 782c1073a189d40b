//! Error types for configuration, the entity store and metadata filtering.
//!
//! Per-key fetch failures are not errors at this level: the resolver turns
//! them into empty outcomes. What remains here is what a caller must handle.

use std::path::PathBuf;

use thiserror::Error;

use crate::api::FetchError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "no licence configured - pass one explicitly or set the GMAXLICENCE environment variable"
    )]
    MissingCredential,

    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode cache file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode payload for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unknown filter key: {0}")]
    UnknownKey(String),

    #[error("Filter {field} needs a timezone-aware timestamp, got naive value {value:?}")]
    NaiveDate { field: String, value: String },

    #[error("Invalid value for filter {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub type Result<T, E = FeedError> = std::result::Result<T, E>;
