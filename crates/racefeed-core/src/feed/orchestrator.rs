//! Public surface: single fetches, range queries, bulk fetches and updates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::executor::{retain_available, retain_non_empty, run_all};
use super::resolver::{ResolveOptions, Resolver};
use crate::api::{Fetcher, HttpFetcher};
use crate::cache::EntityStore;
use crate::config::FeedConfig;
use crate::error::{ConfigError, Result};
use crate::filter::{day_records, RaceFilter, RaceMetadata};
use crate::models::{
    course_code, sharecode_date, EntityType, FetchOutcome, LookupFeed, ModifiedRecord, RaceRecord,
};
use crate::utils::dates::{day_key, day_range};

/// Outcomes of a bulk fetch, per entity type, keyed by sharecode.
pub type DataSet = BTreeMap<EntityType, BTreeMap<String, FetchOutcome>>;

/// Feeds refreshed by `update` unless told otherwise.
pub const DEFAULT_UPDATE_REQUEST: [EntityType; 2] = [EntityType::Sectionals, EntityType::Points];

/// How far back `update` reaches by default, in days before today.
pub const DEFAULT_UPDATE_LOOKBACK_DAYS: i64 = 14;

/// How far back `routes` looks for venues when none are given.
const ROUTE_DISCOVERY_DAYS: i64 = 365;

/// Stride of the sectionals-modified range walk; each query covers 7 days.
const MODIFIED_STRIDE_DAYS: i64 = 6;

/// Which races a bulk fetch covers.
#[derive(Debug, Clone)]
pub enum RaceSelection {
    /// Bare sharecodes, fetched without filtering.
    Keys(Vec<String>),
    /// Racelist records, filtered before fetching. With no filter, only
    /// published races are kept unless a requested feed is served for
    /// unpublished races too.
    Records {
        records: Vec<RaceRecord>,
        filter: Option<RaceFilter>,
    },
}

/// Parameters of one cache-fill cycle.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// Defaults to 14 days ago.
    pub start: Option<NaiveDate>,
    /// Defaults to yesterday.
    pub end: Option<NaiveDate>,
    /// Defaults to sectionals and points.
    pub request: Option<BTreeSet<EntityType>>,
    /// Defaults to published races only.
    pub filter: Option<RaceFilter>,
    pub options: ResolveOptions,
}

/// What an update cycle found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Races listed in the date range.
    pub races: usize,
    /// Races left after filtering.
    pub selected: usize,
    /// Keys with data available, per feed.
    pub available: BTreeMap<EntityType, usize>,
}

pub struct RaceFeed {
    config: Arc<FeedConfig>,
    resolver: Resolver,
}

impl RaceFeed {
    /// Build with the real HTTP fetcher.
    pub fn new(config: FeedConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::from_config(&config)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher))?)
    }

    /// Build with an injected fetcher.
    pub fn with_fetcher(config: FeedConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = Arc::new(EntityStore::new(&config));
        let config = Arc::new(config);
        let resolver = Resolver::new(Arc::clone(&config), store, fetcher);
        Ok(Self { config, resolver })
    }

    /// Build from the settings file and process environment.
    pub fn from_env() -> Result<Self> {
        Self::new(FeedConfig::from_env()?)
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        self.resolver.store()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve one key of any feed.
    ///
    /// Obstacle requests look up the race first; non-jump races short-circuit.
    pub async fn fetch(&self, entity: EntityType, key: &str, opts: ResolveOptions) -> FetchOutcome {
        let race = if entity.requires_jump_race() {
            self.find_race(key, opts).await
        } else {
            None
        };
        self.resolver.resolve(entity, key, race.as_ref(), opts).await
    }

    pub async fn racelist(&self, date: NaiveDate, opts: ResolveOptions) -> FetchOutcome {
        self.resolver
            .resolve(EntityType::Racelist, &day_key(date), None, opts)
            .await
    }

    pub async fn fixtures(&self, date: NaiveDate, opts: ResolveOptions) -> FetchOutcome {
        self.resolver
            .resolve(EntityType::Fixtures, &day_key(date), None, opts)
            .await
    }

    /// Racelist record for one race.
    pub async fn race(&self, sharecode: &str, opts: ResolveOptions) -> Option<RaceRecord> {
        self.find_race(sharecode, opts).await
    }

    /// Every race listed between `start` and `end`, both inclusive.
    pub async fn racelist_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        opts: ResolveOptions,
    ) -> BTreeMap<String, RaceRecord> {
        // Day payloads are needed to build the union even in discard mode.
        let opts = ResolveOptions {
            discard: false,
            ..opts
        };
        let days = day_range(start, end).into_iter().map(day_key);
        let outcomes = run_all(
            |day| async move {
                self.resolver
                    .resolve(EntityType::Racelist, &day, None, opts)
                    .await
            },
            days,
            self.config.concurrency,
        )
        .await;

        let mut races = BTreeMap::new();
        for (day, outcome) in retain_non_empty(outcomes) {
            if let Some(payload) = outcome.payload {
                for record in day_records(&day, payload) {
                    races.insert(record.sharecode.clone(), record);
                }
            }
        }
        debug!(start = %start, end = %end, races = races.len(), "Racelist range resolved");
        races
    }

    /// Fetch several feeds for a selection of races.
    ///
    /// Only per-race feeds are fetched. Keys without data are dropped; in
    /// discard mode, keys whose data exists are kept without payload.
    pub async fn fetch_data(
        &self,
        selection: RaceSelection,
        request: &BTreeSet<EntityType>,
        opts: ResolveOptions,
    ) -> DataSet {
        let races: BTreeMap<String, RaceRecord> = match selection {
            RaceSelection::Keys(keys) => {
                return self.fetch_keys(keys, &BTreeMap::new(), request, opts).await;
            }
            RaceSelection::Records { records, filter } => {
                let mut metadata = RaceMetadata::new();
                metadata.import(records);
                metadata.set_predicate(filter.unwrap_or_else(|| default_filter(request)));
                metadata
                    .apply()
                    .to_records()
                    .into_iter()
                    .map(|record| (record.sharecode.clone(), record))
                    .collect()
            }
        };
        let keys = races.keys().cloned().collect();
        self.fetch_keys(keys, &races, request, opts).await
    }

    async fn fetch_keys(
        &self,
        keys: Vec<String>,
        races: &BTreeMap<String, RaceRecord>,
        request: &BTreeSet<EntityType>,
        opts: ResolveOptions,
    ) -> DataSet {
        let mut output = DataSet::new();
        if keys.is_empty() {
            return output;
        }

        for &entity in request {
            if !entity.is_race_feed() {
                warn!(entity = %entity, "Not a per-race feed, skipping");
                continue;
            }
            let outcomes = run_all(
                |key| self.resolve_race_key(entity, key, races, opts),
                keys.iter().cloned(),
                self.config.concurrency,
            )
            .await;
            let kept = if opts.discard {
                retain_available(outcomes)
            } else {
                retain_non_empty(outcomes)
            };
            debug!(entity = %entity, requested = keys.len(), available = kept.len(), "Feed resolved");
            output.insert(entity, kept);
        }
        output
    }

    async fn resolve_race_key(
        &self,
        entity: EntityType,
        key: String,
        races: &BTreeMap<String, RaceRecord>,
        opts: ResolveOptions,
    ) -> FetchOutcome {
        let looked_up;
        let race = match races.get(&key) {
            Some(race) => Some(race),
            None if entity.requires_jump_race() => {
                looked_up = self.find_race(&key, opts).await;
                looked_up.as_ref()
            }
            None => None,
        };
        self.resolver.resolve(entity, &key, race, opts).await
    }

    /// Route geometry (raw KML) per venue code.
    ///
    /// With no codes, every venue seen in the racelist cache over the last
    /// year is used.
    pub async fn routes(&self, course_codes: &[String], opts: ResolveOptions) -> BTreeMap<String, String> {
        let codes: BTreeSet<String> = if course_codes.is_empty() {
            self.cached_course_codes()
        } else {
            course_codes
                .iter()
                .map(|code| EntityType::Route.normalize_key(code))
                .collect()
        };
        let opts = ResolveOptions {
            discard: false,
            ..opts
        };

        let outcomes = run_all(
            |code| async move {
                self.resolver
                    .resolve(EntityType::Route, &code, None, opts)
                    .await
            },
            codes,
            self.config.concurrency,
        )
        .await;

        retain_non_empty(outcomes)
            .into_iter()
            .filter_map(|(code, outcome)| Some((code, outcome.payload?.into_text()?)))
            .collect()
    }

    fn cached_course_codes(&self) -> BTreeSet<String> {
        let today = Utc::now().date_naive();
        let start = today - Duration::days(ROUTE_DISCOVERY_DAYS);
        let mut codes = BTreeSet::new();
        for day in day_range(start, today) {
            let key = day_key(day);
            let Some(payload) = self
                .resolver
                .cached(EntityType::Racelist, &key, ResolveOptions::offline())
            else {
                continue;
            };
            if let Some(Value::Object(rows)) = payload.as_records() {
                codes.extend(rows.keys().map(|sharecode| course_code(sharecode).to_string()));
            }
        }
        codes
    }

    /// Races whose post-race data changed in the 7 days after `since`.
    /// Never cached.
    pub async fn sectionals_modified(&self, since: DateTime<Utc>) -> BTreeMap<String, ModifiedRecord> {
        let stamp = since.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let Some(value) = self
            .resolver
            .lookup(LookupFeed::SectionalsModified, &stamp)
            .await
        else {
            return BTreeMap::new();
        };
        let rows = match value {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value::<ModifiedRecord>(row) {
                Ok(record) => Some((record.sharecode.clone(), record)),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed sectionals-modified row");
                    None
                }
            })
            .collect()
    }

    /// Modifications from `start` to `end`, queried in overlapping windows.
    pub async fn sectionals_modified_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BTreeMap<String, ModifiedRecord> {
        let end = end.max(start);
        let mut stamps = Vec::new();
        let mut at = start;
        while at < end {
            stamps.push(at);
            at += Duration::days(MODIFIED_STRIDE_DAYS);
        }
        stamps.push(end);

        let outcomes: Vec<BTreeMap<String, ModifiedRecord>> = stream::iter(stamps)
            .map(|since| self.sectionals_modified(since))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut merged = BTreeMap::new();
        for records in outcomes {
            merged.extend(records);
        }
        merged
    }

    /// One cache-fill cycle: list races in the range, filter them and fill
    /// the requested feeds without keeping payloads in memory.
    pub async fn update(&self, request: UpdateRequest) -> UpdateSummary {
        let today = Utc::now().date_naive();
        let start = request
            .start
            .unwrap_or(today - Duration::days(DEFAULT_UPDATE_LOOKBACK_DAYS));
        let end = request.end.unwrap_or(today - Duration::days(1));
        let feeds = request
            .request
            .unwrap_or_else(|| DEFAULT_UPDATE_REQUEST.into_iter().collect());
        let filter = request.filter.unwrap_or_else(RaceFilter::published_only);
        let opts = request.options.discarding();

        info!(start = %start, end = %end, feeds = ?feeds, "Update started");

        let races = self.racelist_range(start, end, opts).await;
        let mut metadata = RaceMetadata::new();
        let listed = metadata.import(races.into_values());
        metadata.set_predicate(filter);
        let selected: BTreeMap<String, RaceRecord> = metadata
            .apply()
            .to_records()
            .into_iter()
            .map(|record| (record.sharecode.clone(), record))
            .collect();

        let keys = selected.keys().cloned().collect();
        let data = self.fetch_keys(keys, &selected, &feeds, opts).await;

        let summary = UpdateSummary {
            start: Some(start),
            end: Some(end),
            races: listed,
            selected: selected.len(),
            available: data
                .iter()
                .map(|(entity, outcomes)| (*entity, outcomes.len()))
                .collect(),
        };
        info!(
            races = summary.races,
            selected = summary.selected,
            available = ?summary.available,
            "Update finished"
        );
        summary
    }

    async fn find_race(&self, sharecode: &str, opts: ResolveOptions) -> Option<RaceRecord> {
        if let Some(date) = sharecode_date(sharecode) {
            let day = day_key(date);
            if let Some(payload) = self.resolver.cached(EntityType::Racelist, &day, opts) {
                // A trusted day file is authoritative, even when the race is missing from it.
                return payload
                    .as_records()
                    .and_then(|rows| rows.get(sharecode))
                    .and_then(|row| serde_json::from_value(row.clone()).ok());
            }
        }
        if opts.offline {
            return None;
        }

        let rows = match self
            .resolver
            .lookup(LookupFeed::RaceBySharecode, sharecode)
            .await?
        {
            Value::Array(rows) => rows,
            other => vec![other],
        };
        rows.into_iter()
            .filter_map(|row| serde_json::from_value::<RaceRecord>(row).ok())
            .find(|record| record.sharecode == sharecode)
    }
}

/// Published races only, unless a requested feed exists before publication.
fn default_filter(request: &BTreeSet<EntityType>) -> RaceFilter {
    if request.iter().any(EntityType::valid_for_unpublished) {
        RaceFilter::default()
    } else {
        RaceFilter::published_only()
    }
}
