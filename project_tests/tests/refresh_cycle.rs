//! Ticking behavior: periodic refresh, failure handling, merge policy, reset.

use std::time::Duration;

use lib_refdata::{ErrorSource, ReferenceDefinition, ReferenceKind, Registry, RegistryOptions};
use project_tests::{alternating, eventually, scripted};
use serde_json::json;

fn fast_registry() -> Registry {
    Registry::new(RegistryOptions {
        default_interval_ms: 50,
        ..Default::default()
    })
}

#[tokio::test]
async fn changed_poller_refreshes_on_interval() {
    let registry = Registry::default();
    let (definition, calls) = alternating("weather", json!([{"id": "sun"}]), json!([{"id": "rain"}]));
    registry.attach(definition.interval_ms(100));

    registry.load(["weather"]).await;
    let reference = registry.get("weather").unwrap();
    assert_eq!(*reference.array(), vec![json!({"id": "sun"})]);

    let switched = eventually(Duration::from_secs(2), || *reference.array() == vec![json!({"id": "rain"})]).await;
    assert!(switched, "second payload never became visible");
    assert!(calls.get() >= 2);
    registry.reset();
}

#[tokio::test]
async fn failed_refresh_keeps_stale_data() {
    let registry = fast_registry();
    let (definition, _) = scripted("muppets", vec![json!([{"id": "1", "name": "Kermit"}])], true, Some(true));
    registry.attach(definition);
    registry.load_all().await;

    let reference = registry.get("muppets").unwrap();
    assert!(reference.loaded());

    assert!(eventually(Duration::from_secs(2), || reference.err().is_some()).await);
    let err = reference.err().unwrap();
    assert_eq!(err.source, ErrorSource::Fetch);
    assert!(err.message.contains("upstream unavailable"));
    assert!(!reference.loaded());
    assert_eq!(*reference.array(), vec![json!({"id": "1", "name": "Kermit"})]);
    assert_eq!(reference.lookup("1").unwrap()["name"], "Kermit");
    registry.reset();
}

#[tokio::test]
async fn first_fetch_failure_still_settles_the_barrier() {
    let registry = Registry::default();
    let (definition, _) = scripted("broken", vec![], true, None);
    registry.attach(definition);

    registry.load(["broken"]).await;
    let reference = registry.get("broken").unwrap();
    assert!(!reference.loaded());
    assert!(reference.array().is_empty());
    assert_eq!(reference.err().unwrap().source, ErrorSource::Fetch);
    registry.reset();
}

#[tokio::test]
async fn poll_failure_is_recorded_without_fetching() {
    let registry = Registry::default();
    let definition = ReferenceDefinition::new("flaky")
        .retriever(|| async { Ok(json!([])) })
        .poller(|| async { Err(anyhow::anyhow!("poller down")) });
    registry.attach(definition);

    registry.load(["flaky"]).await;
    let err = registry.get("flaky").unwrap().err().unwrap();
    assert_eq!(err.source, ErrorSource::Poll);
    assert_eq!(registry.get("flaky").unwrap().kind(), None);
    registry.reset();
}

#[tokio::test]
async fn map_payloads_merge() {
    let registry = fast_registry();
    let (definition, _) = scripted(
        "rates",
        vec![json!({"usd": 1.0, "eur": 0.9}), json!({"eur": 0.95, "gbp": 0.8})],
        false,
        Some(true),
    );
    registry.attach(definition);
    registry.load_all().await;

    let reference = registry.get("rates").unwrap();
    assert_eq!(reference.kind(), Some(ReferenceKind::Map));
    assert!(eventually(Duration::from_secs(2), || reference.lookup("gbp").is_some()).await);

    let map = reference.map();
    assert_eq!(map["usd"], json!(1.0));
    assert_eq!(map["eur"], json!(0.95));
    assert_eq!(map["gbp"], json!(0.8));
    assert!(reference.array().is_empty());
    registry.reset();
}

#[tokio::test]
async fn array_payloads_rebuild_the_map() {
    let registry = fast_registry();
    let (definition, _) = scripted(
        "muppets",
        vec![
            json!([{"id": "1", "name": "Kermit"}, {"id": "2", "name": "Piggy"}]),
            json!([{"id": "3", "name": "Gonzo"}]),
        ],
        false,
        Some(true),
    );
    registry.attach(definition);
    registry.load_all().await;

    let reference = registry.get("muppets").unwrap();
    assert!(eventually(Duration::from_secs(2), || reference.lookup("3").is_some()).await);
    assert_eq!(reference.map().len(), 1);
    assert!(reference.lookup("1").is_none());
    registry.reset();
}

#[tokio::test]
async fn custom_id_field_keys_items() {
    let registry = Registry::default();
    let (definition, _) = scripted(
        "muppets",
        vec![json!([{"code": 7, "name": "Kermit"}, {"code": 8, "name": "Piggy"}])],
        false,
        None,
    );
    registry.attach(definition.id_field("code"));
    registry.load_all().await;

    let reference = registry.get("muppets").unwrap();
    assert_eq!(reference.lookup("8").unwrap()["name"], "Piggy");
    registry.reset();
}

#[tokio::test]
async fn reset_stops_every_ticker() {
    let registry = fast_registry();
    let mut counters = Vec::new();
    for name in ["a", "b", "c"] {
        let (definition, calls) = scripted(name, vec![json!([{"id": name}])], false, Some(true));
        registry.attach(definition);
        counters.push(calls);
    }
    registry.load_all().await;
    assert_eq!(registry.active_tickers(), 3);
    let tickers: Vec<_> = ["a", "b", "c"]
        .iter()
        .filter_map(|name| registry.get(name).and_then(|r| r.ticker()))
        .collect();

    registry.reset();
    assert!(registry.list().is_empty());
    assert!(tickers.iter().all(|ticker| ticker.is_cancelled()));
    assert!(eventually(Duration::from_secs(1), || registry.active_tickers() == 0).await);

    let before: Vec<usize> = counters.iter().map(|c| c.get()).collect();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after: Vec<usize> = counters.iter().map(|c| c.get()).collect();
    assert_eq!(before, after);

    // The registry is usable again after a reset.
    let (definition, _) = scripted("a", vec![json!([{"id": "z"}])], false, None);
    registry.attach(definition);
    registry.load_all().await;
    assert!(registry.get("a").unwrap().lookup("z").is_some());
    registry.reset();
}
