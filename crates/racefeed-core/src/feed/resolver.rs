//! Fetch-or-cache resolution of a single (entity type, key) pair.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::api::{FetchError, Fetcher};
use crate::cache::{is_trustworthy, EntityStore};
use crate::config::FeedConfig;
use crate::models::{
    course_code, EntityType, FetchOutcome, LookupFeed, Payload, PayloadTransform, RaceRecord, Source,
};
use crate::utils::dates::parse_day;
use crate::utils::gates::{normalize_gate_labels, uses_metric_gates};

/// Responses the provider sends instead of route geometry it does not have.
pub const UNAVAILABLE_SENTINELS: [&str; 3] = [
    "File not available - please contact us.",
    "Permission Denied",
    "{}",
];

/// Records in a point-track response shorter than this are line noise.
const MIN_RECORD_LINE_LEN: usize = 6;

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Ignore any cached copy and go to the provider.
    pub force_new: bool,
    /// Never touch the network; a miss is final.
    pub offline: bool,
    /// Cache-fill only: report where data is but do not keep it in memory.
    pub discard: bool,
}

impl ResolveOptions {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn force_new() -> Self {
        Self {
            force_new: true,
            ..Self::default()
        }
    }

    pub fn discarding(self) -> Self {
        Self {
            discard: true,
            ..self
        }
    }
}

/// Composes the entity store, staleness policy and fetcher.
/// Clone is cheap; everything is behind an `Arc`.
#[derive(Clone)]
pub struct Resolver {
    config: Arc<FeedConfig>,
    store: Arc<EntityStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl Resolver {
    pub fn new(config: Arc<FeedConfig>, store: Arc<EntityStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            store,
            fetcher,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Resolve one key. Never fails: every problem ends in an empty outcome.
    ///
    /// `race` is the key's racelist record, needed only by feeds that depend
    /// on the race type.
    pub async fn resolve(
        &self,
        entity: EntityType,
        key: &str,
        race: Option<&RaceRecord>,
        opts: ResolveOptions,
    ) -> FetchOutcome {
        if entity.requires_jump_race() && !race.is_some_and(RaceRecord::is_jump_race) {
            debug!(entity = %entity, key = %key, "Not a jump race, skipping");
            return FetchOutcome::empty(key);
        }

        let key = entity.normalize_key(key);
        let Some(credential) = self.config.credential(entity.credential()) else {
            debug!(entity = %entity, key = %key, "No credential for feed, skipping");
            return FetchOutcome::empty(key);
        };

        if self.has_trusted_entry(entity, &key, opts) {
            if opts.discard && entity != EntityType::Performance {
                debug!(entity = %entity, key = %key, "Cache hit");
                return FetchOutcome::discarded(key, Source::Cache);
            }
            if let Some(payload) = self.load_cached(entity, &key) {
                debug!(entity = %entity, key = %key, "Cache hit");
                return self.finish(entity, key, payload, Source::Cache, opts);
            }
        }

        if opts.offline {
            debug!(entity = %entity, key = %key, "Offline cache miss");
            return FetchOutcome::empty(key);
        }

        debug!(entity = %entity, key = %key, "Cache miss, fetching");
        self.fetch_remote(entity, key, credential, opts).await
    }

    /// The trusted cached payload for a key, without going to the network.
    pub fn cached(&self, entity: EntityType, key: &str, opts: ResolveOptions) -> Option<Payload> {
        let key = entity.normalize_key(key);
        if self.has_trusted_entry(entity, &key, opts) {
            self.load_cached(entity, &key)
        } else {
            None
        }
    }

    /// Query an uncached provider endpoint and parse its JSON answer.
    pub async fn lookup(&self, feed: LookupFeed, value: &str) -> Option<Value> {
        let url = feed.url(&self.config.base_url, value, self.config.licence());
        let body = match self.fetcher.get_text(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(feed = ?feed, value, error = %e, "Lookup failed");
                return None;
            }
        };
        if body.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(feed = ?feed, value, error = %e, "Malformed lookup response");
                None
            }
        }
    }

    fn has_trusted_entry(&self, entity: EntityType, key: &str, opts: ResolveOptions) -> bool {
        if opts.force_new {
            return false;
        }
        let mtime = match self.store.modified(entity, key) {
            Ok(mtime) => mtime,
            Err(e) => {
                warn!(entity = %entity, key = %key, error = %e, "Cannot stat cache entry");
                return false;
            }
        };
        let reference = if entity.is_day_feed() {
            parse_day(key)
        } else {
            None
        };
        let trusted = is_trustworthy(entity, reference, mtime, Utc::now(), opts.force_new, opts.offline);
        if mtime.is_some() && !trusted {
            debug!(entity = %entity, key = %key, "Cache entry inside publication window");
        }
        trusted
    }

    fn load_cached(&self, entity: EntityType, key: &str) -> Option<Payload> {
        let payload = match self.store.load(entity, key) {
            Ok(payload) => payload?,
            Err(e) => {
                warn!(entity = %entity, key = %key, error = %e, "Ignoring unreadable cache entry");
                return None;
            }
        };
        if entity == EntityType::Performance && !has_rx_record(&payload) {
            debug!(entity = %entity, key = %key, "Cached performance data has no RX record");
            return None;
        }
        Some(payload)
    }

    async fn fetch_remote(
        &self,
        entity: EntityType,
        key: String,
        credential: &str,
        opts: ResolveOptions,
    ) -> FetchOutcome {
        let url = entity.url(&self.config.base_url, &key, credential);
        let body = match self.fetcher.get_text(&url).await {
            Ok(body) => body,
            Err(FetchError::PermissionDenied) => {
                warn!(entity = %entity, key = %key, "Permission denied");
                return FetchOutcome::empty(key);
            }
            Err(e) => {
                warn!(entity = %entity, key = %key, error = %e, "Fetch failed");
                return FetchOutcome::empty(key);
            }
        };

        let payload = match apply_transform(entity.transform(), &body) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(entity = %entity, key = %key, "No data available");
                return FetchOutcome::empty(key);
            }
            Err(e) => {
                warn!(entity = %entity, key = %key, error = %e, "Malformed payload");
                return FetchOutcome::empty(key);
            }
        };

        if let Err(e) = self.store.save(entity, &key, &payload) {
            error!(entity = %entity, key = %key, error = %e, "Failed to write cache entry");
        }
        self.finish(entity, key, payload, Source::Remote, opts)
    }

    fn finish(
        &self,
        entity: EntityType,
        key: String,
        mut payload: Payload,
        source: Source,
        opts: ResolveOptions,
    ) -> FetchOutcome {
        if opts.discard {
            return FetchOutcome::discarded(key, source);
        }
        if entity.has_gate_labels() && uses_metric_gates(course_code(&key)) {
            if let Payload::Records(rows) = &mut payload {
                normalize_gate_labels(rows);
            }
        }
        FetchOutcome::found(key, payload, source)
    }
}

/// Turn a response body into the payload to store.
///
/// `Ok(None)` means the provider had nothing for this key. Day indexes are
/// kept even when empty; every other shape needs content.
pub(crate) fn apply_transform(
    transform: PayloadTransform,
    body: &str,
) -> Result<Option<Payload>, serde_json::Error> {
    match transform {
        PayloadTransform::AsIs => {
            if body.trim().is_empty() {
                return Ok(None);
            }
            let payload = Payload::Records(serde_json::from_str(body)?);
            Ok((!payload.is_empty()).then_some(payload))
        }
        PayloadTransform::IndexByIdentifier => {
            let rows: Vec<Value> = if body.trim().is_empty() {
                Vec::new()
            } else {
                match serde_json::from_str(body)? {
                    Value::Null => Vec::new(),
                    other => serde_json::from_value(other)?,
                }
            };
            Ok(Some(Payload::Records(Value::Object(index_by_identifier(rows)))))
        }
        PayloadTransform::LineDelimitedRecords => {
            let rows = body
                .lines()
                .filter(|line| line.len() >= MIN_RECORD_LINE_LEN)
                .map(|line| serde_json::from_str::<Value>(line))
                .collect::<Result<Vec<Value>, _>>()?;
            Ok((!rows.is_empty()).then(|| Payload::Records(Value::Array(rows))))
        }
        PayloadTransform::RawTextUnlessSentinel => {
            let trimmed = body.trim();
            if trimmed.is_empty() || UNAVAILABLE_SENTINELS.contains(&trimmed) {
                Ok(None)
            } else {
                Ok(Some(Payload::Text(body.to_string())))
            }
        }
    }
}

fn index_by_identifier(rows: Vec<Value>) -> Map<String, Value> {
    rows.into_iter()
        .filter_map(|row| {
            let id = match row.get("I")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((id, row))
        })
        .collect()
}

fn has_rx_record(payload: &Payload) -> bool {
    let Some(Value::Array(rows)) = payload.as_records() else {
        return false;
    };
    rows.iter().any(|row| row.get("RX").is_some_and(is_truthy))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// ============================================================================
// Tests
// ============================================================================
