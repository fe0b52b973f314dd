//! Core types for text generation.
//!
//! These model the data flowing between agents and the chat completions
//! endpoint.  [`ChatRequest`] is the wire body; everything else is the
//! caller-facing view.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that shape model behavior.
    System,
    /// Input from the caller.
    User,
    /// Output from the model.
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// What to send to the model: a bare string or a full message list.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Sent as a single `user` message.
    Text(String),
    /// Sent as-is.
    Messages(Vec<Message>),
}

impl Prompt {
    /// The message list this prompt expands to.
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Self::Text(text) => vec![Message::user(text)],
            Self::Messages(messages) => messages,
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

// ---------------------------------------------------------------------------
// Generation options and request
// ---------------------------------------------------------------------------

/// Per-call sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Model override; `None` uses the client's default model.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationOptions {
    /// Options with the given temperature and default everything else.
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Self::default()
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Body of a chat completions request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    /// Provider-reported cost in USD, when available.
    #[serde(default)]
    pub cost: Option<f64>,
}

/// A successful chat completions response.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The full response body.
    pub raw: Value,
    /// Parsed `usage` block, absent when the provider omitted it.
    pub usage: Option<TokenUsage>,
}

impl Completion {
    /// Wrap a raw response body, parsing its `usage` block if well-formed.
    pub fn from_raw(raw: Value) -> Self {
        let usage = raw
            .get("usage")
            .filter(|u| u.is_object())
            .and_then(|u| serde_json::from_value(u.clone()).ok());
        Self { raw, usage }
    }

    /// Text at `choices[0].message.content`, or `""` when any part of that
    /// path is missing.
    pub fn text(&self) -> &str {
        self.raw["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Usage accounting
// ---------------------------------------------------------------------------

/// Per-million-token prices used when the provider reports no cost.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pricing {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

impl Pricing {
    fn cost_of(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt_tokens as f64 * self.prompt_per_million
            + usage.completion_tokens as f64 * self.completion_per_million)
            / 1_000_000.0
    }
}

/// Running totals across all successful calls of one client.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

impl UsageStats {
    /// Add one call's usage.  Totals only ever grow.
    pub fn record(&mut self, usage: &TokenUsage, pricing: &Pricing) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(usage.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(usage.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(usage.total_tokens);

        let cost = match usage.cost {
            Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
            _ => pricing.cost_of(usage),
        };
        self.estimated_cost += cost;
    }
}

impl fmt::Display for UsageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tokens: {} ({} prompt + {} completion), cost: ${:.4}",
            self.total_tokens, self.prompt_tokens, self.completion_tokens, self.estimated_cost
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
