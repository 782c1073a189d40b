//! Feed and cache fixtures.

use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, Utc};
use racefeed_core::{EntityType, FeedConfig, Payload, RaceFeed, RaceRecord};
use tempfile::TempDir;

use super::fetcher::ScriptedFetcher;

pub const LICENCE: &str = "test-licence";

/// A feed over a temporary cache directory and a scripted fetcher.
/// The directory is removed on drop.
#[allow(dead_code)]
pub struct TestFeed {
    pub feed: RaceFeed,
    pub fetcher: Arc<ScriptedFetcher>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestFeed {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_concurrency(concurrency: usize) -> Self {
        Self::with_config(|config| config.concurrency = concurrency)
    }

    pub fn with_config(adjust: impl FnOnce(&mut FeedConfig)) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config =
            FeedConfig::with_cache_root(LICENCE, temp_dir.path()).expect("valid config");
        adjust(&mut config);
        let fetcher = ScriptedFetcher::new();
        let feed = RaceFeed::with_fetcher(config, fetcher.clone()).expect("valid feed");
        Self {
            feed,
            fetcher,
            _temp_dir: temp_dir,
        }
    }

    /// Write a cache entry directly, bypassing the resolver.
    pub fn seed(&self, entity: EntityType, key: &str, payload: &Payload) {
        self.feed
            .store()
            .save(entity, key, payload)
            .expect("Failed to seed cache entry");
    }

    pub fn set_mtime(&self, entity: EntityType, key: &str, at: DateTime<Utc>) {
        let path = self.feed.store().path(entity, key);
        let file = std::fs::File::options()
            .write(true)
            .open(&path)
            .expect("cache entry exists");
        file.set_modified(SystemTime::from(at))
            .expect("Failed to set modification time");
    }
}

#[allow(dead_code)]
pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[allow(dead_code)]
pub fn race(sharecode: &str, race_type: &str, published: bool) -> RaceRecord {
    let mut record = RaceRecord::new(sharecode);
    record.country = Some("GB".to_string());
    record.race_type = Some(race_type.to_string());
    record.published = published;
    record
}
