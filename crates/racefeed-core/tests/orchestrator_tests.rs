//! Integration tests for range queries, bulk fetches and update cycles.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, TimeZone, Utc};
use common::{race, ymd, TestFeed};
use racefeed_core::cache::window_closes;
use racefeed_core::{
    EntityType, Payload, RaceFilter, RaceSelection, ResolveOptions, Source, UpdateRequest,
};
use serde_json::json;

fn sharecodes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("04202403011{:03}", i)).collect()
}

fn script_sectionals(t: &TestFeed, keys: &[String]) {
    for (i, key) in keys.iter().enumerate() {
        // Every third key has no data at the provider.
        if i % 3 != 0 {
            t.fetcher.reply(
                &format!("sectionals.ashx?Sharecode={}", key),
                format!(r#"[{{"G": "Finish", "N": {}}}]"#, i),
            );
        }
    }
}

#[tokio::test]
async fn test_bulk_results_independent_of_pool_size() {
    let keys = sharecodes(20);
    let expected: BTreeSet<String> = keys
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(_, key)| key.clone())
        .collect();
    let request = BTreeSet::from([EntityType::Sectionals]);

    let mut results = Vec::new();
    for pool in [1, 2, 8] {
        let t = TestFeed::with_concurrency(pool);
        script_sectionals(&t, &keys);
        let data = t
            .feed
            .fetch_data(RaceSelection::Keys(keys.clone()), &request, ResolveOptions::default())
            .await;

        let sectionals = &data[&EntityType::Sectionals];
        assert_eq!(sectionals.keys().cloned().collect::<BTreeSet<_>>(), expected);
        assert_eq!(t.fetcher.calls(), keys.len());

        let payloads: BTreeMap<String, Option<Payload>> = sectionals
            .iter()
            .map(|(key, outcome)| (key.clone(), outcome.payload.clone()))
            .collect();
        results.push(payloads);
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
}

#[tokio::test]
async fn test_duplicate_keys_are_fetched_once() {
    let t = TestFeed::new();
    let key = "04202403011430".to_string();
    t.fetcher
        .reply(&format!("sectionals.ashx?Sharecode={}", key), r#"[{"G": "Finish"}]"#);

    let data = t
        .feed
        .fetch_data(
            RaceSelection::Keys(vec![key.clone(), key.clone(), key]),
            &BTreeSet::from([EntityType::Sectionals]),
            ResolveOptions::default(),
        )
        .await;
    assert_eq!(data[&EntityType::Sectionals].len(), 1);
    assert_eq!(t.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_records_default_to_published_only() {
    let t = TestFeed::new();
    let published = "04202403011430";
    let unpublished = "04202403011500";
    for key in [published, unpublished] {
        t.fetcher
            .reply(&format!("sectionals.ashx?Sharecode={}", key), r#"[{"G": "Finish"}]"#);
        t.fetcher
            .reply(&format!("points.ashx?Sharecode={}", key), "{\"T\": 1}\n");
    }
    let records = vec![race(published, "Flat", true), race(unpublished, "Flat", false)];

    let data = t
        .feed
        .fetch_data(
            RaceSelection::Records {
                records: records.clone(),
                filter: None,
            },
            &BTreeSet::from([EntityType::Sectionals]),
            ResolveOptions::default(),
        )
        .await;
    assert_eq!(
        data[&EntityType::Sectionals].keys().collect::<Vec<_>>(),
        vec![published]
    );

    // Points exist before publication, so nothing is filtered out.
    let data = t
        .feed
        .fetch_data(
            RaceSelection::Records {
                records,
                filter: None,
            },
            &BTreeSet::from([EntityType::Points]),
            ResolveOptions::default(),
        )
        .await;
    assert_eq!(data[&EntityType::Points].len(), 2);
}

#[tokio::test]
async fn test_bulk_obstacles_skip_flat_races() {
    let t = TestFeed::new();
    let flat = "04202403011430";
    let chase = "04202403011500";
    t.seed(EntityType::Obstacles, flat, &Payload::Records(json!([{"O": 1}])));
    t.fetcher
        .reply(&format!("jumps.ashx?Sharecode={}", chase), r#"[{"O": 1}]"#);

    let data = t
        .feed
        .fetch_data(
            RaceSelection::Records {
                records: vec![race(flat, "Flat", true), race(chase, "Chase", true)],
                filter: Some(RaceFilter::default()),
            },
            &BTreeSet::from([EntityType::Obstacles]),
            ResolveOptions::default(),
        )
        .await;
    assert_eq!(
        data[&EntityType::Obstacles].keys().collect::<Vec<_>>(),
        vec![chase]
    );
    assert_eq!(t.fetcher.requests(), vec![format!("jumps.ashx?Sharecode={}", chase)]);
}

#[tokio::test]
async fn test_racelist_range_unions_days() {
    let t = TestFeed::new();
    t.fetcher.reply(
        "racelist.ashx?DateLocal=2024-03-01",
        r#"[{"I": "04202403011430", "Published": true}, {"I": "04202403011500"}]"#,
    );
    t.fetcher.reply("racelist.ashx?DateLocal=2024-03-02", "[]");
    t.fetcher.reply(
        "racelist.ashx?DateLocal=2024-03-03",
        r#"[{"I": "65202403031200", "Published": true}]"#,
    );

    let races = t
        .feed
        .racelist_range(ymd(2024, 3, 1), ymd(2024, 3, 3), ResolveOptions::default())
        .await;
    assert_eq!(
        races.keys().cloned().collect::<Vec<_>>(),
        vec!["04202403011430", "04202403011500", "65202403031200"]
    );
    assert_eq!(t.fetcher.calls(), 3);
    // Empty days are still cached.
    assert!(t.feed.store().exists(EntityType::Racelist, "2024-03-02"));
}

#[tokio::test]
async fn test_update_fills_cache_and_summarizes() {
    let t = TestFeed::new();
    t.fetcher.reply(
        "racelist.ashx?DateLocal=2024-03-01",
        r#"[
            {"I": "04202403011430", "Published": true},
            {"I": "04202403011500", "Published": true},
            {"I": "04202403011530", "Published": false}
        ]"#,
    );
    for key in ["04202403011430", "04202403011500"] {
        t.fetcher
            .reply(&format!("sectionals.ashx?Sharecode={}", key), r#"[{"G": "Finish"}]"#);
    }
    t.fetcher
        .reply("points.ashx?Sharecode=04202403011430", "{\"T\": 1}\n");

    let summary = t
        .feed
        .update(UpdateRequest {
            start: Some(ymd(2024, 3, 1)),
            end: Some(ymd(2024, 3, 1)),
            ..UpdateRequest::default()
        })
        .await;

    assert_eq!(summary.races, 3);
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.available[&EntityType::Sectionals], 2);
    assert_eq!(summary.available[&EntityType::Points], 1);
    assert!(t.feed.store().exists(EntityType::Sectionals, "04202403011500"));
    assert!(!t.feed.store().exists(EntityType::Sectionals, "04202403011530"));
}

#[tokio::test]
async fn test_update_offline_counts_cached_entries() {
    let t = TestFeed::new();
    t.seed(
        EntityType::Racelist,
        "2024-03-01",
        &Payload::Records(json!({"04202403011430": {"I": "04202403011430", "Published": true}})),
    );
    t.seed(EntityType::Sectionals, "04202403011430", &Payload::Records(json!([{"G": "Finish"}])));

    let summary = t
        .feed
        .update(UpdateRequest {
            start: Some(ymd(2024, 3, 1)),
            end: Some(ymd(2024, 3, 1)),
            request: Some(BTreeSet::from([EntityType::Sectionals])),
            options: ResolveOptions::offline(),
            ..UpdateRequest::default()
        })
        .await;
    assert_eq!(summary.selected, 1);
    assert_eq!(summary.available[&EntityType::Sectionals], 1);
    assert_eq!(t.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_race_lookup_does_not_cache() {
    let t = TestFeed::new();
    t.fetcher.reply(
        "racelist.ashx?Sharecode=04202403011430",
        r#"[{"I": "04202403011430", "RaceType": "Chase", "Country": "GB"}]"#,
    );

    let record = t
        .feed
        .race("04202403011430", ResolveOptions::default())
        .await
        .expect("race found");
    assert!(record.is_jump_race());
    assert!(!t.feed.store().exists(EntityType::Racelist, "2024-03-01"));
    assert!(t.feed.race("04202403011430", ResolveOptions::offline()).await.is_none());
}

#[tokio::test]
async fn test_race_lookup_prefers_trusted_day_file() {
    let t = TestFeed::new();
    t.seed(
        EntityType::Racelist,
        "2024-03-01",
        &Payload::Records(json!({"04202403011430": {"I": "04202403011430", "Country": "IE"}})),
    );
    t.set_mtime(
        EntityType::Racelist,
        "2024-03-01",
        window_closes(ymd(2024, 3, 1)) + Duration::hours(1),
    );

    let record = t.feed.race("04202403011430", ResolveOptions::default()).await;
    assert_eq!(record.and_then(|r| r.country), Some("IE".to_string()));
    assert_eq!(t.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_routes_for_given_codes() {
    let t = TestFeed::new();
    t.fetcher.reply("routes.ashx?Racecourse=04", "<kml>04</kml>");
    t.fetcher.reply("routes.ashx?Racecourse=65", "Permission Denied");

    let routes = t
        .feed
        .routes(&["4".to_string(), "65".to_string()], ResolveOptions::default())
        .await;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes["04"], "<kml>04</kml>");
}

#[tokio::test]
async fn test_routes_default_to_cached_venues() {
    let t = TestFeed::new();
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let day = yesterday.format("%Y-%m-%d").to_string();
    let sharecode = format!("35{}1430", yesterday.format("%Y%m%d"));
    t.seed(
        EntityType::Racelist,
        &day,
        &Payload::Records(json!({ sharecode.clone(): {"I": sharecode} })),
    );
    t.seed(EntityType::Route, "35", &Payload::Text("<kml>35</kml>".to_string()));

    let routes = t.feed.routes(&[], ResolveOptions::offline()).await;
    assert_eq!(routes.keys().collect::<Vec<_>>(), vec!["35"]);
    assert_eq!(t.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_sectionals_modified_range_strides() {
    let t = TestFeed::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap();
    t.fetcher.reply(
        "sectionals-modified.ashx?DateFrom=2024-03-01T00:00:00Z",
        r#"[{"I": "04202403011430", "Modified": "2024-03-02T09:00:00Z", "Published": true}]"#,
    );
    t.fetcher.reply(
        "sectionals-modified.ashx?DateFrom=2024-03-07T00:00:00Z",
        r#"[{"I": "65202403081200", "Modified": "2024-03-09T10:30:00+00:00", "Published": false}]"#,
    );
    t.fetcher
        .reply("sectionals-modified.ashx?DateFrom=2024-03-13T00:00:00Z", "[]");
    t.fetcher
        .reply("sectionals-modified.ashx?DateFrom=2024-03-14T00:00:00Z", "");

    let modified = t.feed.sectionals_modified_range(start, end).await;
    assert_eq!(t.fetcher.calls(), 4);
    assert_eq!(modified.len(), 2);
    assert!(modified["04202403011430"].published);
    assert_eq!(
        modified["65202403081200"].modified,
        Some(Utc.with_ymd_and_hms(2024, 3, 9, 10, 30, 0).unwrap())
    );
}

#[tokio::test]
async fn test_discarded_bulk_keeps_available_keys() {
    let t = TestFeed::new();
    let keys = sharecodes(3);
    t.seed(EntityType::Sectionals, &keys[0], &Payload::Records(json!([{"G": "Finish"}])));
    t.fetcher
        .reply(&format!("sectionals.ashx?Sharecode={}", keys[1]), r#"[{"G": "Finish"}]"#);

    let data = t
        .feed
        .fetch_data(
            RaceSelection::Keys(keys.clone()),
            &BTreeSet::from([EntityType::Sectionals]),
            ResolveOptions::default().discarding(),
        )
        .await;
    let sectionals = &data[&EntityType::Sectionals];
    assert_eq!(sectionals.len(), 2);
    assert_eq!(sectionals[&keys[0]].source, Some(Source::Cache));
    assert_eq!(sectionals[&keys[1]].source, Some(Source::Remote));
    assert!(sectionals.values().all(|outcome| outcome.payload.is_none()));
}
