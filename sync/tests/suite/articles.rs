use crate::suite::engine_for;
use pretty_assertions::assert_eq;
use riskboard_sync::ListQuery;
use riskboard_sync::LoadMode;
use riskboard_sync::PageOutcome;
use serde_json::Value;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

fn page(start: usize, count: usize, total: usize) -> Value {
    let items: Vec<Value> = (start..start + count)
        .map(|i| json!({ "id": i, "title": format!("article {i}"), "published_at": "2026-01-01" }))
        .collect();
    json!({ "items": items, "total": total, "hasMore": start + count < total })
}

async fn mount_page(server: &MockServer, offset: usize, count: usize, total: usize) {
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .and(query_param("ip", "A"))
        .and(query_param("limit", "20"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(offset, count, total)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn pages_through_the_whole_list() {
    let server = MockServer::start().await;
    mount_page(&server, 0, 20, 57).await;
    mount_page(&server, 20, 20, 57).await;
    mount_page(&server, 40, 17, 57).await;
    let engine = engine_for(&server, "");
    let query = ListQuery::new("A");

    let mut offsets = Vec::new();
    let mut outcome = engine.load_page(&query, LoadMode::Reset).await;
    while let PageOutcome::Loaded(state) = &outcome {
        offsets.push(state.offset);
        outcome = engine.load_page(&query, LoadMode::More).await;
    }

    assert_eq!(offsets, vec![20, 40, 57]);
    assert!(matches!(outcome, PageOutcome::Skipped(_)));
    let state = engine.page_state();
    assert_eq!(state.items.len(), 57);
    assert_eq!(state.total, 57);
    assert!(!state.has_more);
    assert_eq!(state.items[0].date.as_deref(), Some("2026-01-01"));
}

#[tokio::test]
async fn failed_append_keeps_items_and_reports_code() {
    let server = MockServer::start().await;
    mount_page(&server, 0, 20, 57).await;
    Mock::given(method("GET"))
        .and(path("/api/articles"))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db timeout" })))
        .mount(&server)
        .await;
    let engine = engine_for(&server, "");
    let query = ListQuery::new("A");
    engine.load_page(&query, LoadMode::Reset).await;

    let outcome = engine.load_page(&query, LoadMode::More).await;

    let PageOutcome::Failed(state) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(state.items.len(), 20);
    let error = state.error.expect("error");
    assert_eq!(error.code, "ART-HTTP-500");
    assert_eq!(error.message, "db timeout");
    assert!(error.recoverable);
}
