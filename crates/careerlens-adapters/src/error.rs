//! Adapter error types.
//!
//! All adapter subsystems surface errors through [`AdapterError`].

use careerlens_transport::CallFailed;

/// Unified error type for CareerLens adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The credential for a service is absent or blank.
    #[error("missing api key for {service}")]
    MissingApiKey { service: String },

    /// Configuration error in adapter setup.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The remote call failed on every attempt.
    #[error(transparent)]
    CallFailed(#[from] CallFailed),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
