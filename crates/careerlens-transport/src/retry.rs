//! Retry loop with exponential backoff.
//!
//! A client describes one attempt of a remote call by implementing [`Call`]
//! and hands it to [`RetryingTransport::execute`], which runs the attempt up
//! to [`RetryPolicy::max_retries`] times and waits `base_delay * 2^attempt`
//! between attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::{CallFailed, TransportError};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Backoff policy owned by a single transport.  Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.  `max_retries` is the total number of attempts and is
    /// clamped to at least 1.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    /// Total number of attempts a call may make.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay to wait after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

// ---------------------------------------------------------------------------
// Call and Sleeper seams
// ---------------------------------------------------------------------------

/// One remote operation that can be attempted repeatedly.
#[async_trait]
pub trait Call: Send + Sync {
    /// Value produced by a successful attempt.
    type Output: Send;

    /// Build and perform a single attempt.
    async fn attempt(&self) -> Result<Self::Output, TransportError>;

    /// Decide whether `error` is worth another attempt.
    fn is_retryable(&self, error: &TransportError) -> bool {
        error.is_retryable()
    }
}

/// Suspension point between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    async fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Runs [`Call`]s under a [`RetryPolicy`].
///
/// The backoff wait is an async timer, so dropping the future returned by
/// [`execute`](Self::execute) abandons the remaining attempts.  Callers that
/// need an upper bound across the whole sequence can wrap it in
/// `tokio::time::timeout`.
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    service: &'static str,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingTransport {
    /// Create a transport for the named service using the tokio timer.
    pub fn new(service: &'static str, policy: RetryPolicy) -> Self {
        Self {
            service,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The service name used in logs and errors.
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// The policy this transport applies.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Execute `call`, retrying retryable failures with exponential backoff.
    pub async fn execute<C>(&self, call: &C) -> Result<C::Output, CallFailed>
    where
        C: Call + ?Sized,
    {
        let max_retries = self.policy.max_retries();
        let mut attempt: u32 = 0;

        loop {
            debug!(
                service = self.service,
                attempt = attempt + 1,
                max_retries,
                "request attempt"
            );

            let err = match call.attempt().await {
                Ok(output) => {
                    if attempt > 0 {
                        info!(
                            service = self.service,
                            attempts = attempt + 1,
                            "request succeeded after retry"
                        );
                    } else {
                        debug!(service = self.service, "request succeeded");
                    }
                    return Ok(output);
                }
                Err(err) => err,
            };

            let attempts = attempt + 1;

            if !call.is_retryable(&err) {
                error!(
                    service = self.service,
                    attempt = attempts,
                    error = %err,
                    "request failed with non-retryable error"
                );
                return Err(CallFailed {
                    service: self.service,
                    attempts,
                    last_error: err,
                });
            }

            if attempts >= max_retries {
                error!(
                    service = self.service,
                    attempts,
                    error = %err,
                    "request failed, retries exhausted"
                );
                return Err(CallFailed {
                    service: self.service,
                    attempts,
                    last_error: err,
                });
            }

            warn!(
                service = self.service,
                attempt = attempts,
                error = %err,
                "request attempt failed"
            );

            let delay = self.policy.delay_for(attempt);
            info!(
                service = self.service,
                delay_ms = delay.as_millis() as u64,
                "retrying after backoff"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    /// Fails the first `failures` attempts with `error`, then succeeds.
    struct FlakyCall {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> TransportError,
    }

    impl FlakyCall {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                error: || TransportError::Status {
                    status: 503,
                    body: "unavailable".into(),
                },
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Call for FlakyCall {
        type Output = &'static str;

        async fn attempt(&self) -> Result<Self::Output, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok("ok")
            }
        }
    }

    fn transport(max_retries: u32, sleeper: Arc<RecordingSleeper>) -> RetryingTransport {
        RetryingTransport::new("test", RetryPolicy::new(max_retries, Duration::from_millis(100)))
            .with_sleeper(sleeper)
    }

    #[test]
    fn policy_clamps_zero_retries() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_retries(), 1);
    }

    #[test]
    fn policy_delays_double() {
        let policy = RetryPolicy::new(5, Duration::from_millis(250));
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
    }

    #[test]
    fn policy_delay_saturates() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(
            policy.delay_for(64),
            Duration::from_secs(1).saturating_mul(u32::MAX)
        );
    }

    #[test]
    fn default_policy_matches_client_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn always_failing_call_uses_every_attempt() {
        for max_retries in 1..=5 {
            let sleeper = Arc::new(RecordingSleeper::default());
            let call = FlakyCall::new(u32::MAX);

            let err = transport(max_retries, sleeper.clone())
                .execute(&call)
                .await
                .unwrap_err();

            assert_eq!(call.calls(), max_retries);
            assert_eq!(err.attempts, max_retries);
            assert!(matches!(
                err.last_error,
                TransportError::Status { status: 503, .. }
            ));

            let expected: Vec<Duration> = (0..max_retries - 1)
                .map(|i| Duration::from_millis(100) * 2u32.pow(i))
                .collect();
            assert_eq!(sleeper.delays(), expected);
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let call = FlakyCall::new(2);

        let output = transport(3, sleeper.clone()).execute(&call).await.unwrap();

        assert_eq!(output, "ok");
        assert_eq!(call.calls(), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn first_attempt_success_never_sleeps() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let call = FlakyCall::new(0);

        transport(3, sleeper.clone()).execute(&call).await.unwrap();

        assert_eq!(call.calls(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let call = FlakyCall {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            error: || TransportError::InvalidRequest {
                reason: "bad header".into(),
            },
        };

        let err = transport(4, sleeper.clone()).execute(&call).await.unwrap_err();

        assert_eq!(call.calls(), 1);
        assert_eq!(err.attempts, 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_waits_for_backoff() {
        let call = FlakyCall::new(2);
        let transport =
            RetryingTransport::new("timed", RetryPolicy::new(3, Duration::from_secs(1)));

        let start = tokio::time::Instant::now();
        transport.execute(&call).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
