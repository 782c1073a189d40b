//! Bounded concurrent dispatch of a per-key operation.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use futures::stream::{self, StreamExt};

use crate::models::FetchOutcome;

/// Run `resolve` for every distinct key, at most `limit` at a time.
///
/// Duplicate keys are collapsed before dispatch, so no two workers ever
/// resolve the same key within one call. The result is keyed by the original
/// key and does not depend on completion order. A failing key never aborts
/// the others; it just produces an empty outcome.
pub async fn run_all<I, F, Fut>(resolve: F, keys: I, limit: usize) -> BTreeMap<String, FetchOutcome>
where
    I: IntoIterator<Item = String>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    let keys: BTreeSet<String> = keys.into_iter().collect();

    stream::iter(keys)
        .map(|key| {
            let pending = resolve(key.clone());
            async move { (key, pending.await) }
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}

/// Keep only outcomes that carry actual content.
pub fn retain_non_empty(outcomes: BTreeMap<String, FetchOutcome>) -> BTreeMap<String, FetchOutcome> {
    outcomes
        .into_iter()
        .filter(|(_, outcome)| outcome.has_data())
        .collect()
}

/// Keep outcomes for which data exists, with or without a payload in memory.
pub fn retain_available(outcomes: BTreeMap<String, FetchOutcome>) -> BTreeMap<String, FetchOutcome> {
    outcomes
        .into_iter()
        .filter(|(_, outcome)| outcome.is_available())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Payload, Source};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn outcome_for(key: String) -> FetchOutcome {
        if key.ends_with('0') {
            FetchOutcome::empty(key)
        } else {
            let payload = Payload::Records(json!([{ "I": key.clone() }]));
            FetchOutcome::found(key, payload, Source::Remote)
        }
    }

    #[tokio::test]
    async fn test_duplicates_resolved_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let keys = vec!["a".to_string(), "b".to_string(), "a".to_string()];

        let results = run_all(
            move |key| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { outcome_for(key) }
            },
            keys,
            4,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(results.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let keys: Vec<String> = (1..=20).map(|i| format!("k{}", i)).collect();

        let results = run_all(
            |key| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    outcome_for(key)
                }
            },
            keys,
            3,
        )
        .await;

        assert_eq!(results.len(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_zero_limit_still_runs() {
        let results = run_all(|key| async move { outcome_for(key) }, vec!["x1".to_string()], 0).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_retention_helpers() {
        let keys: Vec<String> = ["k1", "k10", "k2"].iter().map(|k| k.to_string()).collect();
        let results = run_all(|key| async move { outcome_for(key) }, keys, 2).await;

        let non_empty = retain_non_empty(results.clone());
        assert_eq!(non_empty.keys().cloned().collect::<Vec<_>>(), vec!["k1", "k2"]);

        let mut with_discarded = results;
        with_discarded.insert("k3".to_string(), FetchOutcome::discarded("k3", Source::Cache));
        let available = retain_available(with_discarded);
        assert_eq!(available.len(), 3);
        assert!(!available.contains_key("k10"));
    }
}
