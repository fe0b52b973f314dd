//! Integration tests for the search client.
//!
//! A fake search endpoint runs on an ephemeral local port so the full
//! request/retry/response cycle is exercised over real HTTP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use careerlens_adapters::{AdapterError, SearchClient, SearchClientConfig};
use careerlens_transport::{RetryPolicy, TransportError};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;

// ── helpers ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeSearch {
    /// Number of leading requests answered with a 500.
    fail_first: usize,
    /// Answer successful requests with a body that is not JSON.
    garbage_body: bool,
    hits: AtomicUsize,
    payloads: Mutex<Vec<Value>>,
}

impl FakeSearch {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn last_payload(&self) -> Value {
        self.payloads.lock().unwrap().last().cloned().unwrap()
    }
}

async fn handle_search(State(fake): State<Arc<FakeSearch>>, body: String) -> Response {
    let n = fake.hits.fetch_add(1, Ordering::SeqCst);
    if let Ok(payload) = serde_json::from_str::<Value>(&body) {
        fake.payloads.lock().unwrap().push(payload);
    }

    if n < fake.fail_first {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    if fake.garbage_body {
        return (StatusCode::OK, "<html>not json</html>").into_response();
    }

    axum::Json(json!({
        "query": "echo",
        "results": [
            {"title": "Rust Engineer", "url": "https://example.com/job", "score": 0.9}
        ]
    }))
    .into_response()
}

/// Bind to 127.0.0.1:0 and serve the fake search endpoint.
async fn start_fake(fake: Arc<FakeSearch>) -> String {
    let app = Router::new()
        .route("/search", post(handle_search))
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to port 0");
    let addr: SocketAddr = listener.local_addr().expect("get local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    format!("http://127.0.0.1:{}/search", addr.port())
}

fn client_for(url: String) -> SearchClient {
    let mut config = SearchClientConfig::tavily("tvly-test-key");
    config.base_url = url;
    config.timeout = Duration::from_secs(5);
    config.retry_policy = RetryPolicy::new(3, Duration::from_millis(1));
    SearchClient::new(config).unwrap()
}

// ── search ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_returns_body_unmodified() {
    let fake = Arc::new(FakeSearch::default());
    let client = client_for(start_fake(fake.clone()).await);

    let mut params = Map::new();
    params.insert("max_results".into(), json!(3));
    let result = client.search("rust developer salary", params).await.unwrap();

    assert_eq!(result["results"][0]["title"], "Rust Engineer");
    assert_eq!(result["query"], "echo");

    let payload = fake.last_payload();
    assert_eq!(payload["api_key"], "tvly-test-key");
    assert_eq!(payload["query"], "rust developer salary");
    assert_eq!(payload["max_results"], 3);
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn job_market_search_sends_preset() {
    let fake = Arc::new(FakeSearch::default());
    let client = client_for(start_fake(fake.clone()).await);

    client.search_job_market("data engineer demand").await.unwrap();

    let payload = fake.last_payload();
    assert_eq!(payload["search_depth"], "advanced");
    assert_eq!(payload["max_results"], 10);
    let domains = payload["include_domains"].as_array().unwrap();
    assert!(domains.contains(&json!("glassdoor.com")));
}

#[tokio::test]
async fn course_search_sends_preset() {
    let fake = Arc::new(FakeSearch::default());
    let client = client_for(start_fake(fake.clone()).await);

    client.search_courses("kubernetes certification").await.unwrap();

    let domains = fake.last_payload()["include_domains"].clone();
    assert!(domains.as_array().unwrap().contains(&json!("edx.org")));
}

// ── retries ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let fake = Arc::new(FakeSearch {
        fail_first: 2,
        ..Default::default()
    });
    let client = client_for(start_fake(fake.clone()).await);

    let result = client.search("rust", Map::new()).await.unwrap();

    assert!(result["results"].is_array());
    assert_eq!(fake.hits(), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_call_failed() {
    let fake = Arc::new(FakeSearch {
        fail_first: usize::MAX,
        ..Default::default()
    });
    let client = client_for(start_fake(fake.clone()).await);

    let err = client.search("rust", Map::new()).await.unwrap_err();

    match err {
        AdapterError::CallFailed(failed) => {
            assert_eq!(failed.attempts, 3);
            match failed.last_error {
                TransportError::Status { status, body } => {
                    assert_eq!(status, 500);
                    assert_eq!(body, "upstream exploded");
                }
                other => panic!("expected status error, got {other:?}"),
            }
        }
        other => panic!("expected CallFailed, got {other:?}"),
    }
    assert_eq!(fake.hits(), 3);
}

#[tokio::test]
async fn undecodable_body_is_retried_then_reported() {
    let fake = Arc::new(FakeSearch {
        garbage_body: true,
        ..Default::default()
    });
    let client = client_for(start_fake(fake.clone()).await);

    let err = client.search("rust", Map::new()).await.unwrap_err();

    let AdapterError::CallFailed(failed) = err else {
        panic!("expected CallFailed");
    };
    assert!(matches!(failed.last_error, TransportError::Decode { .. }));
    assert_eq!(fake.hits(), 3);
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client_for(format!("http://127.0.0.1:{port}/search"));
    let err = client.search("rust", Map::new()).await.unwrap_err();

    let AdapterError::CallFailed(failed) = err else {
        panic!("expected CallFailed");
    };
    assert_eq!(failed.attempts, 3);
    assert!(matches!(failed.last_error, TransportError::Network { .. }));
}
