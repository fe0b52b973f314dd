//! Transport error types.
//!
//! A [`TransportError`] describes why one attempt failed.  Once the retry
//! budget is spent the transport surfaces a single [`CallFailed`] that keeps
//! the last attempt error as its [`std::error::Error::source`].

/// Failure of a single attempt against a remote service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("network error: {reason}")]
    Network { reason: String },

    /// The service answered with a non-2xx status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("undecodable response: {reason}")]
    Decode { reason: String },

    /// The provider reported an error inside an otherwise valid response.
    #[error("provider error: {reason}")]
    Provider { reason: String },

    /// The request itself could not be built.  Retrying cannot fix this.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl TransportError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode {
                reason: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        if err.is_builder() {
            return Self::InvalidRequest {
                reason: err.to_string(),
            };
        }
        Self::Network {
            reason: err.to_string(),
        }
    }
}

/// All attempts of a call failed.
#[derive(Debug, thiserror::Error)]
#[error("{service} call failed after {attempts} attempts")]
pub struct CallFailed {
    /// Name of the remote service, used in logs and messages.
    pub service: &'static str,
    /// Number of attempts actually made.
    pub attempts: u32,
    /// The error of the final attempt.
    #[source]
    pub last_error: TransportError,
}
