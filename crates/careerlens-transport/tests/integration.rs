//! Integration tests for the retrying transport's public API.

use std::error::Error as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use careerlens_transport::{Call, RetryPolicy, RetryingTransport, TransportError};

/// Always answers with the given HTTP status.
struct StatusCall {
    status: u16,
    attempts: AtomicU32,
    /// Treat 4xx as permanent.
    fatal_client_errors: bool,
}

impl StatusCall {
    fn new(status: u16, fatal_client_errors: bool) -> Self {
        Self {
            status,
            attempts: AtomicU32::new(0),
            fatal_client_errors,
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Call for StatusCall {
    type Output = ();

    async fn attempt(&self) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Status {
            status: self.status,
            body: String::new(),
        })
    }

    fn is_retryable(&self, error: &TransportError) -> bool {
        match error {
            TransportError::Status { status, .. } if self.fatal_client_errors => {
                !(400..500).contains(status)
            }
            other => other.is_retryable(),
        }
    }
}

fn fast_transport(max_retries: u32) -> RetryingTransport {
    RetryingTransport::new("svc", RetryPolicy::new(max_retries, Duration::from_millis(1)))
}

#[tokio::test]
async fn calls_may_classify_their_own_failures() {
    let not_found = StatusCall::new(404, true);
    let err = fast_transport(5).execute(&not_found).await.unwrap_err();
    assert_eq!(not_found.attempts(), 1);
    assert_eq!(err.attempts, 1);

    let unavailable = StatusCall::new(503, true);
    let err = fast_transport(5).execute(&unavailable).await.unwrap_err();
    assert_eq!(unavailable.attempts(), 5);
    assert_eq!(err.attempts, 5);
}

#[tokio::test]
async fn call_failed_keeps_last_error_as_source() {
    let call = StatusCall::new(502, false);
    let err = fast_transport(2).execute(&call).await.unwrap_err();

    assert_eq!(err.to_string(), "svc call failed after 2 attempts");
    let source = err.source().expect("source is set");
    assert_eq!(source.to_string(), "service returned 502: ");
}

#[tokio::test(start_paused = true)]
async fn dropping_execute_cancels_backoff() {
    let call = Arc::new(StatusCall::new(503, false));
    let transport = RetryingTransport::new("svc", RetryPolicy::new(10, Duration::from_secs(60)));

    // First attempt fails at t=0, then the transport waits 60s.
    let result = tokio::time::timeout(Duration::from_secs(5), transport.execute(call.as_ref())).await;

    assert!(result.is_err());
    assert_eq!(call.attempts(), 1);

    // Nothing resumes after the future is gone.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(call.attempts(), 1);
}

#[test]
fn transport_exposes_its_configuration() {
    let policy = RetryPolicy::new(4, Duration::from_millis(500));
    let transport = RetryingTransport::new("tavily", policy);
    assert_eq!(transport.service(), "tavily");
    assert_eq!(transport.policy(), policy);
}
