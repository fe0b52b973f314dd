//! Text generation layer.
//!
//! - [`types`] -- Messages, prompts, generation options and usage accounting.
//! - [`client`] -- Retrying HTTP client for OpenAI-compatible chat endpoints.

pub mod client;
pub mod types;

pub use client::{DEFAULT_MODEL, GenerationClient, LlmClientConfig, OPENROUTER_BASE_URL};
pub use types::{
    ChatRequest, Completion, GenerationOptions, Message, Pricing, Prompt, Role, TokenUsage,
    UsageStats,
};
