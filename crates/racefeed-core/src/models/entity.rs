//! Entity types and their dispatch table.
//!
//! Every remote feed the provider exposes maps to one `EntityType`. The enum
//! carries everything the resolver needs to know about a feed: where its
//! cache lives, how to build its URL, how to turn a response into a stored
//! payload and when a cached copy can be trusted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Query parameter carrying the credential on every provider endpoint.
pub const CREDENTIAL_PARAM: &str = "k";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Racelist,
    Fixtures,
    Sectionals,
    SectionalsRaw,
    SectionalsHistory,
    Points,
    Obstacles,
    Performance,
    Route,
}

/// How a successful response body becomes a stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadTransform {
    /// Store the parsed JSON unchanged.
    AsIs,
    /// Turn a list of records into a map keyed by each record's `I` field.
    IndexByIdentifier,
    /// One JSON record per line.
    LineDelimitedRecords,
    /// Keep the body verbatim unless it is a "not available" sentinel.
    RawTextUnlessSentinel,
}

/// When a cached copy may be used without asking the provider again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessRule {
    /// Trusted only once the cache file was written after the publication
    /// window for the key's date closed.
    PublicationWindow,
    /// Trusted whenever a cache entry exists.
    Immutable,
}

/// Which configured credential a feed is requested with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Licence,
    AltLicence,
}

impl EntityType {
    pub const ALL: [EntityType; 9] = [
        EntityType::Racelist,
        EntityType::Fixtures,
        EntityType::Sectionals,
        EntityType::SectionalsRaw,
        EntityType::SectionalsHistory,
        EntityType::Points,
        EntityType::Obstacles,
        EntityType::Performance,
        EntityType::Route,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Racelist => "racelist",
            EntityType::Fixtures => "fixtures",
            EntityType::Sectionals => "sectionals",
            EntityType::SectionalsRaw => "sectionals-raw",
            EntityType::SectionalsHistory => "sectionals-history",
            EntityType::Points => "points",
            EntityType::Obstacles => "obstacles",
            EntityType::Performance => "performance",
            EntityType::Route => "route",
        }
    }

    /// Directory name used when no override is configured.
    pub fn default_dir(&self) -> &'static str {
        match self {
            EntityType::Racelist => "racelist",
            EntityType::Fixtures => "fixtures",
            EntityType::Sectionals => "sectionals",
            EntityType::SectionalsRaw => "sectionals-raw",
            EntityType::SectionalsHistory => "sectionals-hist",
            EntityType::Points => "gpsData",
            EntityType::Obstacles => "jumps",
            EntityType::Performance => "tracker-errors",
            EntityType::Route => "routes",
        }
    }

    /// Environment variable that overrides this entity's cache directory.
    pub fn dir_env_var(&self) -> &'static str {
        match self {
            EntityType::Racelist => "RACELIST_PATH",
            EntityType::Fixtures => "FIXTURES_PATH",
            EntityType::Sectionals => "SEC_PATH",
            EntityType::SectionalsRaw => "SEC_RAW_PATH",
            EntityType::SectionalsHistory => "SEC_HIST_PATH",
            EntityType::Points => "GPS_PATH",
            EntityType::Obstacles => "JUMPS_PATH",
            EntityType::Performance => "PERFORMANCE_PATH",
            EntityType::Route => "ROUTE_PATH",
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            EntityType::Racelist => "racelist.ashx",
            EntityType::Fixtures => "fixtures.ashx",
            EntityType::Sectionals => "sectionals.ashx",
            EntityType::SectionalsRaw => "sectionals-raw.ashx",
            EntityType::SectionalsHistory => "sectionals-history.ashx",
            EntityType::Points => "points.ashx",
            EntityType::Obstacles => "jumps.ashx",
            EntityType::Performance => "performance.ashx",
            EntityType::Route => "routes.ashx",
        }
    }

    fn key_param(&self) -> &'static str {
        match self {
            EntityType::Racelist | EntityType::Fixtures => "DateLocal",
            EntityType::Route => "Racecourse",
            _ => "Sharecode",
        }
    }

    /// Build the request URL for `key`.
    pub fn url(&self, base_url: &str, key: &str, credential: &str) -> String {
        format!(
            "{}/{}?{}={}&{}={}",
            base_url.trim_end_matches('/'),
            self.endpoint(),
            self.key_param(),
            key,
            CREDENTIAL_PARAM,
            credential
        )
    }

    pub fn transform(&self) -> PayloadTransform {
        match self {
            EntityType::Racelist | EntityType::Fixtures => PayloadTransform::IndexByIdentifier,
            EntityType::Points => PayloadTransform::LineDelimitedRecords,
            EntityType::Route => PayloadTransform::RawTextUnlessSentinel,
            _ => PayloadTransform::AsIs,
        }
    }

    pub fn staleness(&self) -> StalenessRule {
        match self {
            EntityType::Racelist | EntityType::Fixtures => StalenessRule::PublicationWindow,
            _ => StalenessRule::Immutable,
        }
    }

    pub fn credential(&self) -> CredentialKind {
        match self {
            EntityType::SectionalsRaw => CredentialKind::AltLicence,
            _ => CredentialKind::Licence,
        }
    }

    /// Whether the key is a calendar date (`YYYY-MM-DD`) rather than a sharecode.
    pub fn is_day_feed(&self) -> bool {
        matches!(self, EntityType::Racelist | EntityType::Fixtures)
    }

    /// Whether the feed is keyed by sharecode and describes one race.
    pub fn is_race_feed(&self) -> bool {
        !self.is_day_feed() && *self != EntityType::Route
    }

    /// Feeds the provider serves before a race's data is published.
    pub fn valid_for_unpublished(&self) -> bool {
        matches!(
            self,
            EntityType::SectionalsRaw
                | EntityType::SectionalsHistory
                | EntityType::Points
                | EntityType::Obstacles
        )
    }

    /// Feeds that only carry data for jump races.
    pub fn requires_jump_race(&self) -> bool {
        *self == EntityType::Obstacles
    }

    /// Sectional feeds whose gate labels may need converting to furlongs.
    pub fn has_gate_labels(&self) -> bool {
        matches!(
            self,
            EntityType::Sectionals | EntityType::SectionalsHistory | EntityType::SectionalsRaw
        )
    }

    /// Canonical form of a key: route venue codes are zero-padded to two digits.
    pub fn normalize_key(&self, key: &str) -> String {
        let key = key.trim();
        match self {
            EntityType::Route => format!("{:0>2}", key),
            _ => key.to_string(),
        }
    }

    /// File name of the cache entry for a (normalized) key.
    pub fn file_name(&self, key: &str) -> String {
        match self {
            EntityType::Route => format!("Racecourse-{}.kml", key),
            _ => key.to_string(),
        }
    }

    /// Inverse of `file_name`, used when listing a cache directory.
    pub fn key_from_file_name(&self, file_name: &str) -> Option<String> {
        match self {
            EntityType::Route => file_name
                .strip_prefix("Racecourse-")
                .and_then(|rest| rest.strip_suffix(".kml"))
                .map(str::to_string),
            _ => Some(file_name.to_string()),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity type: {0}")]
pub struct UnknownEntityType(pub String);

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EntityType::ALL
            .iter()
            .copied()
            .find(|entity| entity.label() == wanted)
            .or(match wanted.as_str() {
                // Directory-style aliases used by older configurations.
                "jumps" => Some(EntityType::Obstacles),
                "gps" | "gpsdata" => Some(EntityType::Points),
                "routes" => Some(EntityType::Route),
                "sectionals-hist" => Some(EntityType::SectionalsHistory),
                _ => None,
            })
            .ok_or_else(|| UnknownEntityType(s.to_string()))
    }
}

/// Provider endpoints that are queried directly and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFeed {
    /// Racelist rows for a single sharecode.
    RaceBySharecode,
    /// Sharecodes whose post-race data changed in the 7 days after a timestamp.
    SectionalsModified,
}

impl LookupFeed {
    pub fn url(&self, base_url: &str, value: &str, credential: &str) -> String {
        let (endpoint, param) = match self {
            LookupFeed::RaceBySharecode => ("racelist.ashx", "Sharecode"),
            LookupFeed::SectionalsModified => ("sectionals-modified.ashx", "DateFrom"),
        };
        format!(
            "{}/{}?{}={}&{}={}",
            base_url.trim_end_matches('/'),
            endpoint,
            param,
            value,
            CREDENTIAL_PARAM,
            credential
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
