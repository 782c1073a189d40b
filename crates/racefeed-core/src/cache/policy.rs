//! Staleness policy: when may a cached copy be used instead of refetching?
//!
//! Racelists and fixtures keep changing after race day because results are
//! confirmed and published over the following days. A copy written within
//! the publication window is presumed incomplete. Every other feed is
//! treated as immutable once the provider has served it.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{EntityType, StalenessRule};
use crate::utils::dates::start_of_day_utc;

/// Days after a race date during which its racelist may still change.
pub const PUBLICATION_WINDOW_DAYS: i64 = 6;

/// Instant after which a cache write for `date` is considered complete.
/// The boundary itself is still inside the window.
pub fn window_closes(date: NaiveDate) -> DateTime<Utc> {
    start_of_day_utc(date) + Duration::days(PUBLICATION_WINDOW_DAYS)
}

/// Decide whether a cache entry may be trusted.
///
/// `cache_mtime` is `None` when there is no entry. `reference_date` is the
/// date a day-level key refers to; when absent, `now`'s date is used.
pub fn is_trustworthy(
    entity: EntityType,
    reference_date: Option<NaiveDate>,
    cache_mtime: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    force_new: bool,
    offline: bool,
) -> bool {
    if force_new {
        return false;
    }
    let Some(mtime) = cache_mtime else {
        return false;
    };
    if offline {
        return true;
    }
    match entity.staleness() {
        StalenessRule::Immutable => true,
        StalenessRule::PublicationWindow => {
            let reference = reference_date.unwrap_or_else(|| now.date_naive());
            mtime > window_closes(reference)
        }
    }
}
