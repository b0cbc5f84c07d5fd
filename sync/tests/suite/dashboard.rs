use crate::suite::engine_for;
use pretty_assertions::assert_eq;
use riskboard_sync::FallbackReason;
use riskboard_sync::FieldKind;
use riskboard_sync::Notice;
use riskboard_sync::Resolution;
use riskboard_sync::SelectionKey;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

const SIX_FIELDS: &str = r#"
[dashboard]
fields = ["risk", "timeseries", "themes", "outlets", "clusters", "health"]
"#;

async fn mount(server: &MockServer, route: &str, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_healthy(server: &MockServer) {
    mount(
        server,
        "/api/risk-score",
        200,
        json!({ "meta": { "total_articles": 120, "ip_id": "A" }, "risk_score": 42.0 }),
    )
    .await;
    mount(
        server,
        "/api/risk-timeseries",
        200,
        json!({ "items": [{ "ts": "2026-01-01T00:00:00Z", "risk_score": 40.0 }] }),
    )
    .await;
    mount(
        server,
        "/api/risk-themes",
        200,
        json!({ "meta": { "count": 120 }, "items": [{ "category": "billing", "article_count": 70 }] }),
    )
    .await;
    mount(
        server,
        "/api/risk-outlets",
        200,
        json!({ "meta": { "count": 120 }, "items": [{ "source": "wire", "article_count": 50 }] }),
    )
    .await;
    mount(
        server,
        "/api/ip-clusters",
        200,
        json!({ "meta": { "cluster_count": 1 }, "items": [{ "cluster": "outage" }] }),
    )
    .await;
    mount(
        server,
        "/api/health",
        200,
        json!({ "ok": true, "mode": "live", "scheduler_job_count": 4 }),
    )
    .await;
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

#[tokio::test]
async fn six_field_resolution_is_cached_for_the_session() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    let engine = engine_for(&server, SIX_FIELDS);
    let key = SelectionKey::from("A");

    let first = engine.resolve(&key).await;
    let Resolution::Fresh(entry) = &first else {
        panic!("expected fresh resolution, got {first:?}");
    };
    assert_eq!(request_count(&server).await, 6);
    assert!(!entry.using_fallback);
    let risk = entry.snapshot.risk.value().expect("risk");
    assert_eq!(risk.meta.total_count, Some(120));
    assert_eq!(risk.value, Some(42.0));

    let second = engine.resolve(&key).await;
    let Resolution::Cached(hit) = &second else {
        panic!("expected cache hit, got {second:?}");
    };
    assert!(Arc::ptr_eq(hit, entry));
    assert_eq!(request_count(&server).await, 6);
}

#[tokio::test]
async fn optional_failures_degrade_softly() {
    let server = MockServer::start().await;
    mount(&server, "/api/risk-outlets", 500, json!({ "detail": "outlet index rebuilding" })).await;
    mount(&server, "/api/ip-clusters", 502, json!({})).await;
    mount_healthy(&server).await;
    let engine = engine_for(&server, SIX_FIELDS);

    let resolution = engine.resolve(&SelectionKey::from("A")).await;

    let Resolution::Fresh(entry) = resolution else {
        panic!("expected fresh resolution");
    };
    let snapshot = &entry.snapshot;
    assert!(snapshot.outlets.is_missing());
    assert!(snapshot.clusters.is_missing());
    assert_eq!(snapshot.failure, None);
    let outlets = &snapshot.field_failures[&FieldKind::Outlets];
    assert_eq!(outlets.code, "DASH-OUTLET-HTTP-500");
    assert_eq!(outlets.message, "outlet index rebuilding");
    assert_eq!(
        snapshot.notices,
        vec![Notice::PartialData {
            fields: vec![FieldKind::Outlets, FieldKind::Clusters],
        }]
    );
}

#[tokio::test]
async fn mandatory_failure_is_blocking_and_uncached() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/api/risk-score",
        503,
        json!({ "detail": { "message": "risk model reloading" } }),
    )
    .await;
    mount_healthy(&server).await;
    let engine = engine_for(&server, SIX_FIELDS);
    let key = SelectionKey::from("A");

    let resolution = engine.resolve(&key).await;

    let Resolution::Blocked(snapshot) = resolution else {
        panic!("expected blocked resolution");
    };
    let failure = snapshot.failure.expect("blocking failure");
    assert_eq!(failure.code, "DASH-RISK-HTTP-503");
    assert_eq!(failure.message, "risk model reloading");
    assert!(engine.cache().get(&key).is_none());

    engine.resolve(&key).await;
    assert_eq!(request_count(&server).await, 12);
}

#[tokio::test]
async fn zero_results_fall_back_to_sample_when_enabled() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/api/risk-score",
        200,
        json!({ "meta": { "totalCount": 0 }, "value": 0.0 }),
    )
    .await;
    mount_healthy(&server).await;
    let engine = engine_for(&server, &format!("{SIX_FIELDS}\n[fallback]\nenabled = true\n"));

    let resolution = engine.resolve(&SelectionKey::from("lostark")).await;

    let Resolution::Fresh(entry) = resolution else {
        panic!("expected fresh resolution");
    };
    assert!(entry.using_fallback);
    assert_eq!(entry.snapshot.fallback_reason, Some(FallbackReason::NoData));
    let risk = entry.snapshot.risk.value().expect("sample risk");
    assert_eq!(risk.meta.key.as_deref(), Some("lostark"));
    assert!(entry.snapshot.timeseries.is_live());
}

#[tokio::test]
async fn poll_merges_without_disturbing_charts() {
    let server = MockServer::start().await;
    mount_healthy(&server).await;
    let engine = engine_for(&server, SIX_FIELDS);
    let key = SelectionKey::from("A");
    let rendered = engine
        .resolve(&key)
        .await
        .snapshot()
        .cloned()
        .expect("snapshot");

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/risk-score"))
        .and(query_param("ip", "A"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "meta": { "totalCount": 121 }, "value": 44.0 })),
        )
        .mount(&server)
        .await;
    mount(&server, "/api/health", 500, json!({})).await;

    let outcome = engine.poll_once(&key).await;

    let riskboard_sync::PollOutcome::Updated(update) = outcome else {
        panic!("expected update");
    };
    let merged = rendered.merge_volatile(&update);
    assert_eq!(merged.risk.value().and_then(|r| r.value), Some(44.0));
    assert_eq!(merged.health, rendered.health);
    assert_eq!(merged.timeseries, rendered.timeseries);
    assert_eq!(merged.themes, rendered.themes);
}
