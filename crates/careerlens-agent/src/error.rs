//! Agent error types.
//!
//! All agent subsystems surface errors through [`AgentError`].  Parse and
//! validation problems inside the structured extractor never reach this
//! type; they are logged and repaired or dropped where they occur.

use careerlens_adapters::AdapterError;
use careerlens_transport::CallFailed;

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Configuration errors ------------------------------------------------
    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    // -- Input errors --------------------------------------------------------
    /// The agent was handed input it cannot work with.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A prompt template referenced a variable that was not supplied.
    #[error("missing template variable: {name}")]
    MissingTemplateVariable { name: String },

    // -- Upstream errors -----------------------------------------------------
    /// A generation call failed on every attempt.
    #[error(transparent)]
    CallFailed(#[from] CallFailed),

    /// An error propagated from the search adapter.
    #[error("search error: {0}")]
    Search(#[from] AdapterError),

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }
}
