//! Race metadata as published in the racelist feed.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::utils::dates::parse_timestamp;

/// Race types (lowercased substrings) that carry obstacle data.
const JUMP_RACE_MARKERS: [&str; 3] = ["hurdle", "chase", "nh flat"];

/// Venue code of a sharecode: its first two characters.
pub fn course_code(sharecode: &str) -> &str {
    sharecode.get(..2).unwrap_or(sharecode)
}

/// Race date encoded in characters 3 to 10 of a sharecode (`YYYYMMDD`).
pub fn sharecode_date(sharecode: &str) -> Option<NaiveDate> {
    let digits = sharecode.get(2..10)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// One race's metadata, keyed by its sharecode.
///
/// Fields the provider sends that are not modelled here are kept in `extra`
/// so a record can be written back without losing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    #[serde(rename = "I")]
    pub sharecode: String,
    #[serde(rename = "Racecourse", default)]
    pub racecourse: Option<String>,
    #[serde(rename = "Country", default)]
    pub country: Option<String>,
    #[serde(rename = "RaceType", default)]
    pub race_type: Option<String>,
    #[serde(rename = "PostTime", default)]
    pub post_time: Option<String>,
    #[serde(rename = "Published", default)]
    pub published: bool,
    #[serde(rename = "RaceLength", default, deserialize_with = "lenient_f64")]
    pub race_length: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RaceRecord {
    pub fn new(sharecode: impl Into<String>) -> Self {
        Self {
            sharecode: sharecode.into(),
            racecourse: None,
            country: None,
            race_type: None,
            post_time: None,
            published: false,
            race_length: None,
            extra: Map::new(),
        }
    }

    pub fn course_code(&self) -> &str {
        course_code(&self.sharecode)
    }

    /// Scheduled start, if `PostTime` carries an explicit offset.
    pub fn scheduled_at(&self) -> Option<DateTime<FixedOffset>> {
        self.post_time.as_deref().and_then(parse_timestamp)
    }

    /// Hurdle, chase and NH flat races have obstacle feeds; flat races don't.
    pub fn is_jump_race(&self) -> bool {
        match &self.race_type {
            Some(race_type) => {
                let lower = race_type.to_ascii_lowercase();
                JUMP_RACE_MARKERS.iter().any(|marker| lower.contains(marker))
            }
            None => false,
        }
    }
}

/// Entry of the sectionals-modified feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedRecord {
    #[serde(rename = "I")]
    pub sharecode: String,
    #[serde(rename = "Modified", default, deserialize_with = "lenient_utc")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(rename = "Published", default)]
    pub published: bool,
}

/// Accept race lengths sent either as numbers or numeric strings.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_utc<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .as_deref()
        .and_then(parse_timestamp)
        .map(|dt| dt.with_timezone(&Utc)))
}
