//! Feed orchestration.
//!
//! - `Resolver`: fetch-or-cache for one (entity type, key) pair
//! - `run_all`: bounded concurrent dispatch over many keys
//! - `RaceFeed`: the public surface composing both with the metadata filter

pub mod executor;
pub mod orchestrator;
pub mod resolver;

pub use executor::{retain_available, retain_non_empty, run_all};
pub use orchestrator::{
    DataSet, RaceFeed, RaceSelection, UpdateRequest, UpdateSummary, DEFAULT_UPDATE_LOOKBACK_DAYS,
    DEFAULT_UPDATE_REQUEST,
};
pub use resolver::{ResolveOptions, Resolver, UNAVAILABLE_SENTINELS};
