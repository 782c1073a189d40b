//! Metadata filtering.
//!
//! `RaceMetadata` holds every imported `RaceRecord` and a filtered view
//! derived from it by the last applied `RaceFilter`. The view always shares
//! records with the full set (`Arc`), and an unrestricted filter makes the
//! view the full set itself. Callers only ever get read access to the view.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cache::EntityStore;
use crate::error::{FilterError, StoreError};
use crate::models::{course_code, EntityType, Payload, RaceRecord};
use crate::utils::dates::{is_naive_timestamp, parse_timestamp};

/// Option names accepted by `RaceFilter::from_options`.
pub const FILTER_OPTIONS: [&str; 7] = [
    "countries",
    "courses",
    "course_codes",
    "race_types",
    "published",
    "start_date",
    "end_date",
];

/// Predicate over race metadata. `None` fields do not restrict.
///
/// All set fields are ANDed. Date bounds are inclusive and always carry a
/// timezone; a record without a parseable, offset-carrying `PostTime` fails
/// any date bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceFilter {
    pub countries: Option<BTreeSet<String>>,
    pub courses: Option<BTreeSet<String>>,
    pub course_codes: Option<BTreeSet<String>>,
    pub race_types: Option<BTreeSet<String>>,
    pub published: Option<bool>,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
}

impl RaceFilter {
    pub fn published_only() -> Self {
        Self {
            published: Some(true),
            ..Self::default()
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self == &Self::default()
    }

    /// Parse a generic options map, failing on any name it does not know.
    pub fn from_options(options: &Map<String, Value>) -> Result<Self, FilterError> {
        let mut filter = Self::default();
        for (name, value) in options {
            match name.as_str() {
                "countries" => filter.countries = string_set(name, value)?,
                "courses" => filter.courses = string_set(name, value)?,
                "course_codes" => filter.course_codes = string_set(name, value)?,
                "race_types" => filter.race_types = string_set(name, value)?,
                "published" => {
                    filter.published = match value {
                        Value::Null => None,
                        Value::Bool(flag) => Some(*flag),
                        other => {
                            return Err(FilterError::InvalidValue {
                                field: name.clone(),
                                reason: format!("expected a boolean, got {}", other),
                            })
                        }
                    }
                }
                "start_date" => filter.start_date = bound(name, value)?,
                "end_date" => filter.end_date = bound(name, value)?,
                _ => return Err(FilterError::UnknownKey(name.clone())),
            }
        }
        Ok(filter)
    }

    /// Test one record. `key` is the record's key in the metadata set.
    pub fn matches(&self, key: &str, record: &RaceRecord) -> bool {
        if !contains(&self.countries, record.country.as_deref()) {
            return false;
        }
        if !contains(&self.courses, record.racecourse.as_deref()) {
            return false;
        }
        if !contains(&self.course_codes, Some(course_code(key))) {
            return false;
        }
        if !contains(&self.race_types, record.race_type.as_deref()) {
            return false;
        }
        if let Some(published) = self.published {
            if record.published != published {
                return false;
            }
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            let Some(scheduled) = record.scheduled_at() else {
                return false;
            };
            if self.start_date.is_some_and(|start| scheduled < start) {
                return false;
            }
            if self.end_date.is_some_and(|end| scheduled > end) {
                return false;
            }
        }
        true
    }
}

fn contains(allowed: &Option<BTreeSet<String>>, value: Option<&str>) -> bool {
    match allowed {
        None => true,
        Some(set) => value.is_some_and(|v| set.contains(v)),
    }
}

fn string_set(field: &str, value: &Value) -> Result<Option<BTreeSet<String>>, FilterError> {
    let invalid = |reason: &str| FilterError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    };
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(BTreeSet::from([s.clone()]))),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(invalid("expected a list of strings")),
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Some),
        _ => Err(invalid("expected a string or a list of strings")),
    }
}

fn bound(field: &str, value: &Value) -> Result<Option<DateTime<FixedOffset>>, FilterError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            if let Some(dt) = parse_timestamp(s) {
                Ok(Some(dt))
            } else if is_naive_timestamp(s) {
                Err(FilterError::NaiveDate {
                    field: field.to_string(),
                    value: s.clone(),
                })
            } else {
                Err(FilterError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("not a timestamp: {:?}", s),
                })
            }
        }
        other => Err(FilterError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a timestamp string, got {}", other),
        }),
    }
}

type RecordMap = BTreeMap<String, Arc<RaceRecord>>;

/// Read-only access to the current filtered view.
#[derive(Debug, Clone, Copy)]
pub struct FilteredView<'a> {
    records: &'a RecordMap,
}

impl<'a> FilteredView<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&'a RaceRecord> {
        self.records.get(key).map(Arc::as_ref)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a String> + 'a {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a String, &'a RaceRecord)> + 'a {
        self.records.iter().map(|(key, record)| (key, record.as_ref()))
    }

    /// Owned copies of the selected records, for handing to other tasks.
    pub fn to_records(&self) -> Vec<RaceRecord> {
        self.records.values().map(|record| record.as_ref().clone()).collect()
    }
}

/// Distinct field values present in the full metadata set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistinctValues {
    pub countries: BTreeSet<String>,
    pub courses: BTreeSet<String>,
    pub course_codes: BTreeSet<String>,
    pub race_types: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RaceMetadata {
    data: RecordMap,
    predicate: RaceFilter,
    /// `None` while the view is the full set.
    view: Option<RecordMap>,
}

impl RaceMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert records by sharecode; a later record replaces an earlier one.
    /// The view is reset to the full set until `apply` is called again.
    pub fn import<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = RaceRecord>,
    {
        let mut count = 0;
        for record in records {
            self.data.insert(record.sharecode.clone(), Arc::new(record));
            count += 1;
        }
        self.view = None;
        count
    }

    /// Import every racelist day file in the store.
    ///
    /// Files that fail to decode are logged and skipped.
    pub fn import_store(&mut self, store: &EntityStore) -> Result<usize, StoreError> {
        let mut records = Vec::new();
        for day in store.keys(EntityType::Racelist)? {
            match store.load(EntityType::Racelist, &day) {
                Ok(Some(payload)) => records.extend(day_records(&day, payload)),
                Ok(None) => {}
                Err(StoreError::Decode { path, source }) => {
                    warn!(path = %path.display(), error = %source, "Skipping unreadable racelist file");
                }
                Err(e) => return Err(e),
            }
        }
        let count = self.import(records);
        debug!(count, "Imported racelist cache");
        Ok(count)
    }

    /// Store a predicate without evaluating it.
    pub fn set_predicate(&mut self, predicate: RaceFilter) {
        self.predicate = predicate;
    }

    pub fn predicate(&self) -> &RaceFilter {
        &self.predicate
    }

    /// Recompute the view from the full set using the stored predicate.
    pub fn apply(&mut self) -> FilteredView<'_> {
        self.view = if self.predicate.is_unrestricted() {
            None
        } else {
            let predicate = &self.predicate;
            Some(
                self.data
                    .iter()
                    .filter(|(key, record)| predicate.matches(key, record))
                    .map(|(key, record)| (key.clone(), Arc::clone(record)))
                    .collect(),
            )
        };
        self.view()
    }

    pub fn view(&self) -> FilteredView<'_> {
        FilteredView {
            records: self.view.as_ref().unwrap_or(&self.data),
        }
    }

    /// Whether the view is the full set itself rather than a filtered copy.
    pub fn view_is_full_set(&self) -> bool {
        self.view.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&RaceRecord> {
        self.data.get(key).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop all records and the predicate.
    pub fn clear(&mut self) {
        self.data.clear();
        self.view = None;
        self.predicate = RaceFilter::default();
    }

    pub fn distinct_values(&self) -> DistinctValues {
        let mut values = DistinctValues::default();
        for (key, record) in &self.data {
            values.course_codes.insert(course_code(key).to_string());
            if let Some(country) = &record.country {
                values.countries.insert(country.clone());
            }
            if let Some(course) = &record.racecourse {
                values.courses.insert(course.clone());
            }
            if let Some(race_type) = &record.race_type {
                values.race_types.insert(race_type.clone());
            }
        }
        values
    }
}

/// Records of one racelist day payload (a map keyed by sharecode).
pub(crate) fn day_records(day: &str, payload: Payload) -> Vec<RaceRecord> {
    let Some(Value::Object(rows)) = payload.into_records() else {
        return Vec::new();
    };
    rows.into_iter()
        .filter_map(|(sharecode, row)| match serde_json::from_value::<RaceRecord>(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(day, sharecode = %sharecode, error = %e, "Skipping malformed racelist row");
                None
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
