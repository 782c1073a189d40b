//! racefeed core library.
//!
//! Cache-or-fetch orchestration for a provider of post-race data feeds
//! (racelists, sectionals, GPS points, obstacles, route geometry). Each
//! request for a feed and key is answered from a local file cache when the
//! cached copy can be trusted, and from the provider otherwise; bulk
//! requests run through a bounded worker pool.
//!
//! ```no_run
//! use racefeed_core::{FeedConfig, RaceFeed, UpdateRequest};
//!
//! # async fn run() -> racefeed_core::Result<()> {
//! let feed = RaceFeed::new(FeedConfig::from_env()?)?;
//! let summary = feed.update(UpdateRequest::default()).await;
//! println!("{} races selected", summary.selected);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod filter;
pub mod models;
pub mod utils;

pub use api::{FetchError, Fetcher, HttpFetcher};
pub use cache::{EntityStore, StoreStats};
pub use config::{FeedConfig, FeedSettings};
pub use error::{ConfigError, FeedError, FilterError, Result, StoreError};
pub use feed::{
    DataSet, RaceFeed, RaceSelection, ResolveOptions, Resolver, UpdateRequest, UpdateSummary,
};
pub use filter::{DistinctValues, FilteredView, RaceFilter, RaceMetadata};
pub use models::{EntityType, FetchOutcome, ModifiedRecord, Payload, RaceRecord, Source};
