use pretty_assertions::assert_eq;
use riskboard_sync::FetchFailure;
use riskboard_sync::FetchRequest;
use riskboard_sync::HttpTransport;
use riskboard_sync::Transport;
use serde_json::Value;
use serde_json::json;
use std::time::Duration;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

fn transport(server: &MockServer) -> HttpTransport {
    HttpTransport::new(&server.uri(), Duration::from_secs(2)).expect("transport")
}

#[tokio::test]
async fn sends_query_and_accept_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/risk-timeseries"))
        .and(query_param("ip", "maplestory"))
        .and(query_param("hours", "168"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let value = transport(&server)
        .get(
            &FetchRequest::new("/api/risk-timeseries")
                .param("ip", "maplestory")
                .param("hours", 168),
        )
        .await
        .expect("success");

    assert_eq!(value, json!({ "items": [] }));
}

#[tokio::test]
async fn error_status_carries_detail_and_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/risk-score"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({ "detail": { "message": "too many requests" } })),
        )
        .mount(&server)
        .await;

    let failure = transport(&server)
        .get(&FetchRequest::new("/api/risk-score"))
        .await
        .expect_err("429");

    let FetchFailure::Http {
        status,
        message,
        body,
        retry_after_secs,
    } = failure
    else {
        panic!("expected http failure");
    };
    assert_eq!(status, 429);
    assert_eq!(message.as_deref(), Some("too many requests"));
    assert_eq!(retry_after_secs, Some(7));
    assert!(body.expect("body kept").contains("too many requests"));
}

#[tokio::test]
async fn retry_after_falls_back_to_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(json!({ "detail": { "reason": "warming up", "retry_after": 12 } })),
        )
        .mount(&server)
        .await;

    let failure = transport(&server)
        .get(&FetchRequest::new("/api/health"))
        .await
        .expect_err("503");

    assert_eq!(
        failure,
        FetchFailure::Http {
            status: 503,
            message: Some("warming up".into()),
            body: Some(r#"{"detail":{"reason":"warming up","retry_after":12}}"#.into()),
            retry_after_secs: Some(12),
        }
    );
}

#[tokio::test]
async fn no_content_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/burst-events"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let value = transport(&server)
        .get(&FetchRequest::new("/api/burst-events"))
        .await
        .expect("204");

    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let failure = transport(&server)
        .get(&FetchRequest::new("/api/health"))
        .await
        .expect_err("decode");

    assert!(matches!(failure, FetchFailure::Decode(_)), "{failure:?}");
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let transport =
        HttpTransport::new(&server.uri(), Duration::from_millis(200)).expect("transport");

    let failure = transport
        .get(&FetchRequest::new("/api/health"))
        .await
        .expect_err("timeout");

    assert_eq!(failure, FetchFailure::Timeout);
}

#[tokio::test]
async fn unreachable_host_is_a_network_failure() {
    let transport =
        HttpTransport::new("http://127.0.0.1:1", Duration::from_secs(2)).expect("transport");

    let failure = transport
        .get(&FetchRequest::new("/api/health"))
        .await
        .expect_err("connection refused");

    assert!(matches!(failure, FetchFailure::Network(_)), "{failure:?}");
}
