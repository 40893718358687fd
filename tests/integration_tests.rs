//! Integration tests using wiremock to simulate HTTP servers.

use chrono::{DateTime, TimeZone, Utc};
use rebound::metadata::RequestMetadata;
use rebound::processor::IsoDateProcessor;
use rebound::{Client, Error, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn test_data() -> TestData {
    TestData {
        id: 1,
        name: "Test".to_string(),
    }
}

fn client_for(server: &MockServer, max_attempts: usize) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .max_attempts(max_attempts)
        .retry_delay(Duration::from_millis(1))
        .build()
        .unwrap()
}

/// Responds with `failures` copies of `status`, then 200 with `test_data()`.
fn failing_then_ok(status: u16, failures: usize, counter: Arc<AtomicUsize>) -> impl wiremock::Respond {
    move |_req: &wiremock::Request| {
        let count = counter.fetch_add(1, Ordering::SeqCst);
        if count < failures {
            ResponseTemplate::new(status).set_body_string("Server error")
        } else {
            ResponseTemplate::new(200).set_body_json(test_data())
        }
    }
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 3).get::<TestData>("/test").await;

    assert!(response.success());
    assert_eq!(response.status.map(|s| s.as_u16()), Some(200));
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
    assert_eq!(response.value(), Some(&test_data()));
}

#[tokio::test]
async fn test_successful_post_request() {
    let mock_server = MockServer::start().await;

    let request_data = TestData {
        id: 0,
        name: "New".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/test"))
        .and(header("content-type", "application/json"))
        .and(body_json(&request_data))
        .respond_with(ResponseTemplate::new(201).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 3)
        .post::<TestData, TestData>("/test", &request_data)
        .await;

    assert_eq!(response.status.map(|s| s.as_u16()), Some(201));
    assert_eq!(response.into_value().unwrap(), test_data());
}

#[tokio::test]
async fn test_single_attempt_budget_never_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 1)
        .get::<TestData>("/test")
        .await;

    assert!(!response.success());
    assert_eq!(response.attempts, 1);
}

#[tokio::test]
async fn test_retry_on_5xx_until_success() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(failing_then_ok(500, 4, attempt_count.clone()))
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 5).get::<TestData>("/test").await;

    assert!(response.success());
    assert_eq!(response.attempts, 5);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_attempts_exhausted_returns_last_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 3).get::<TestData>("/test").await;

    assert!(!response.success());
    assert_eq!(response.status.map(|s| s.as_u16()), Some(500));
    assert_eq!(response.attempts, 3);
    assert!(response.error.is_none());

    match response.into_value() {
        Err(Error::HttpError { status, raw_response }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(raw_response, "Server error");
        }
        other => panic!("Expected HttpError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 5).get::<TestData>("/test").await;

    assert!(response.is_not_found());
    assert!(response.is_client_error());
    assert_eq!(response.attempts, 1);

    let err = response.into_value().unwrap_err();
    assert_eq!(err.to_string(), "HTTP error 404 Not Found: Not found");
}

#[tokio::test]
async fn test_forbidden_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 5)
        .delete::<serde_json::Value>("/test")
        .await;

    assert!(response.is_forbidden());
    assert!(response.value().is_none());
}

#[tokio::test]
async fn test_unauthorized_without_auth_strategy_backs_off() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));

    Mock::given(method("GET"))
        .respond_with(failing_then_ok(401, 1, attempt_count.clone()))
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 3).get::<TestData>("/test").await;

    assert!(response.success());
    assert_eq!(response.attempts, 2);
}

#[tokio::test]
async fn test_deserialization_error_fails_successful_exchange() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 3).get::<TestData>("/test").await;

    assert!(!response.success());
    assert_eq!(response.status.map(|s| s.as_u16()), Some(200));
    assert!(response.value().is_none());

    match response.into_value() {
        Err(Error::DeserializationFailed {
            raw_response,
            message,
            status,
        }) => {
            assert_eq!(status.as_u16(), 200);
            assert_eq!(raw_response, "invalid json");
            assert!(message.contains("expected"));
        }
        other => panic!("Expected DeserializationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_shape_mismatch_is_a_decoding_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "one"})))
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 3).get::<TestData>("/test").await;

    assert!(!response.success());
    assert!(matches!(
        response.error,
        Some(Error::DeserializationFailed { .. })
    ));
}

#[tokio::test]
async fn test_empty_body_decodes_as_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 3).delete::<()>("/test").await;

    assert!(response.success());
    assert_eq!(response.status.map(|s| s.as_u16()), Some(204));
    assert_eq!(response.value(), Some(&()));
}

#[tokio::test]
async fn test_custom_decoder() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 7})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, 1);

    let count = client
        .call_with(
            RequestMetadata::new(http::Method::GET, "/count"),
            None,
            |json| json["count"].as_u64().ok_or("missing count"),
        )
        .await;
    assert_eq!(count.into_value().unwrap(), 7);

    let missing = client
        .call_with(
            RequestMetadata::new(http::Method::GET, "/count"),
            None,
            |json| json["total"].as_u64().ok_or("missing total"),
        )
        .await;
    match missing.into_value() {
        Err(Error::DeserializationFailed { message, .. }) => assert_eq!(message, "missing total"),
        other => panic!("Expected DeserializationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_inbound_date_processor() {
    #[derive(Deserialize)]
    struct Event {
        at: DateTime<Utc>,
        label: String,
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "at": "2024-01-01T01:00:00+01:00",
            "label": "hello"
        })))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .inbound_processor(Arc::new(IsoDateProcessor))
        .build()
        .unwrap();

    let event = client.get::<Event>("/event").await.into_value().unwrap();

    assert_eq!(event.at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(event.label, "hello");
}

#[tokio::test]
async fn test_outbound_processor_rewrites_request_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(body_json(serde_json::json!({"id": 1, "name": "2024-01-01T00:00:00Z"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .outbound_processor(Arc::new(IsoDateProcessor))
        .build()
        .unwrap();

    let body = TestData {
        id: 1,
        name: "2024-01-01T02:00:00+02:00".to_string(),
    };
    let response = client.put::<_, TestData>("/test", &body).await;
    assert!(response.success());
}

#[tokio::test]
async fn test_network_failure_is_terminal() {
    let client = Client::builder()
        .base_url("http://127.0.0.1:1")
        .unwrap()
        .max_attempts(5)
        .build()
        .unwrap();

    let response = client.get::<TestData>("/test").await;

    assert!(!response.success());
    assert_eq!(response.status, None);
    assert_eq!(response.attempts, 1);
    assert!(matches!(response.error, Some(Error::Network(_))));
}

#[tokio::test]
async fn test_timeout_is_terminal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_data())
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let response = client.get::<TestData>("/test").await;

    assert_eq!(response.attempts, 1);
    assert!(matches!(response.error, Some(Error::Timeout)));
}

#[tokio::test]
async fn test_redirect_is_returned_as_is() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server, 3).get::<TestData>("/old").await;

    assert_eq!(response.status.map(|s| s.as_u16()), Some(302));
    assert_eq!(response.header("location"), Some("/new"));
    assert_eq!(response.attempts, 1);
}

#[tokio::test]
async fn test_default_headers_and_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(header("user-agent", "test-agent"))
        .and(header("x-request", "42"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_data()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .default_header("User-Agent", "test-agent")
        .unwrap()
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(http::Method::GET, "/test")
        .with_header("x-request", "42")
        .unwrap()
        .with_query_param("page", "1");

    let response = client.call::<(), TestData>(metadata, None).await;
    assert!(response.success());
}

#[tokio::test]
async fn test_linear_strategy_waits_between_attempts() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));

    Mock::given(method("PATCH"))
        .respond_with(failing_then_ok(502, 2, attempt_count))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .max_attempts(3)
        .retry_delay(Duration::from_millis(50))
        .retry_strategy(RetryStrategy::Linear)
        .build()
        .unwrap();

    let start = std::time::Instant::now();
    let response = client.patch::<_, TestData>("/test", &test_data()).await;

    assert!(response.success());
    assert_eq!(response.attempts, 3);
    // 50ms after attempt 1, 100ms after attempt 2
    assert!(start.elapsed() >= Duration::from_millis(150));
}
