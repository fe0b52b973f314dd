//! Transport primitives for CareerLens.
//!
//! Every remote service client in the workspace (the text-generation client
//! and the search client) sends its requests through a [`RetryingTransport`]:
//!
//! - **[`retry`]** -- [`RetryPolicy`] (exponential backoff, multiplier 2),
//!   the [`Call`] trait a client implements to describe one attempt, and the
//!   [`Sleeper`] suspension point used between attempts.
//! - **[`error`]** -- [`TransportError`] for a single failed attempt and
//!   [`CallFailed`] for an exhausted retry budget.
//!
//! The transport is intentionally small: no jitter, no circuit breaker and
//! no budget shared across calls.  Each call to
//! [`RetryingTransport::execute`] starts with a fresh retry budget.

pub mod error;
pub mod retry;

pub use error::{CallFailed, TransportError};
pub use retry::{Call, RetryPolicy, RetryingTransport, Sleeper, TokioSleeper};
