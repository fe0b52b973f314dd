//! Retrying client for OpenAI-compatible chat completions endpoints.
//!
//! Targets OpenRouter by default.  Each call is one non-streaming
//! `POST {base_url}/chat/completions` sent through a [`RetryingTransport`];
//! token usage of successful calls is accumulated on the client.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use careerlens_transport::{Call, RetryPolicy, RetryingTransport, Sleeper, TransportError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AgentError, Result};
use crate::llm::types::{ChatRequest, Completion, GenerationOptions, Pricing, Prompt, UsageStats};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default OpenRouter API base URL.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Model used when neither the call nor the configuration names one.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Attribution headers OpenRouter uses to identify the calling app.
const DEFAULT_REFERER: &str = "https://career-advisor-agent.com";
const DEFAULT_TITLE: &str = "Career Advisor Agent";

/// Service name used in logs and errors.
const SERVICE: &str = "openrouter";

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for one chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Model used when [`GenerationOptions::model`] is `None`.
    pub default_model: String,
    /// Value of the `HTTP-Referer` header.
    pub referer: String,
    /// Value of the `X-Title` header.
    pub title: String,
    /// Timeout for a single attempt.
    pub timeout: Duration,
    /// Backoff policy applied to every call.
    pub retry_policy: RetryPolicy,
    /// Fallback pricing when the provider reports no cost.
    pub pricing: Pricing,
}

impl LlmClientConfig {
    /// Create a configuration for the OpenRouter API.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENROUTER_BASE_URL.to_owned(),
            default_model: DEFAULT_MODEL.to_owned(),
            referer: DEFAULT_REFERER.to_owned(),
            title: DEFAULT_TITLE.to_owned(),
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            pricing: Pricing::default(),
        }
    }

    /// Replace the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat completions client with retries and usage accounting.
///
/// Cloning is cheap; clones share the usage totals.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    config: Arc<LlmClientConfig>,
    url: String,
    http: reqwest::Client,
    transport: RetryingTransport,
    usage: Arc<Mutex<UsageStats>>,
}

impl GenerationClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: SERVICE.into(),
            });
        }

        let url = config.completions_url();
        url::Url::parse(&url)
            .map_err(|e| AgentError::config(format!("invalid generation url `{url}`: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::config(format!("failed to build HTTP client: {e}")))?;

        let transport = RetryingTransport::new(SERVICE, config.retry_policy);

        Ok(Self {
            config: Arc::new(config),
            url,
            http,
            transport,
            usage: Arc::new(Mutex::new(UsageStats::default())),
        })
    }

    /// Replace the sleeper used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.transport = self.transport.with_sleeper(sleeper);
        self
    }

    /// The model used when a call does not name one.
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Send `prompt` and return the full response envelope.
    pub async fn generate(
        &self,
        prompt: impl Into<Prompt>,
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.default_model.clone()),
            messages: prompt.into().into_messages(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!(
            url = %self.url,
            model = %request.model,
            messages = request.messages.len(),
            "sending generation request"
        );

        let call = ChatCall {
            client: self,
            request: &request,
        };
        let raw = self.transport.execute(&call).await?;
        let completion = Completion::from_raw(raw);

        match &completion.usage {
            Some(usage) => {
                let mut totals = self.usage.lock().unwrap_or_else(|p| p.into_inner());
                totals.record(usage, &self.config.pricing);
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "usage recorded"
                );
            }
            None => debug!("response carried no usage block"),
        }

        info!(model = %request.model, "generation successful");
        Ok(completion)
    }

    /// Send `prompt` and return only the generated text.
    ///
    /// A response without `choices[0].message.content` yields `""`.
    pub async fn get_completion(
        &self,
        prompt: impl Into<Prompt>,
        options: &GenerationOptions,
    ) -> Result<String> {
        let completion = self.generate(prompt, options).await?;
        Ok(completion.text().to_owned())
    }

    /// Snapshot of the accumulated usage.
    pub fn usage_stats(&self) -> UsageStats {
        self.usage
            .lock()
            .map(|u| u.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    fn headers(&self) -> std::result::Result<HeaderMap, TransportError> {
        let invalid = |name: &str, e: reqwest::header::InvalidHeaderValue| {
            TransportError::InvalidRequest {
                reason: format!("invalid {name} header: {e}"),
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| invalid("authorization", e))?,
        );
        headers.insert(
            "http-referer",
            HeaderValue::from_str(&self.config.referer).map_err(|e| invalid("referer", e))?,
        );
        headers.insert(
            "x-title",
            HeaderValue::from_str(&self.config.title).map_err(|e| invalid("title", e))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

// ---------------------------------------------------------------------------
// Single attempt
// ---------------------------------------------------------------------------

struct ChatCall<'a> {
    client: &'a GenerationClient,
    request: &'a ChatRequest,
}

#[async_trait]
impl Call for ChatCall<'_> {
    type Output = Value;

    async fn attempt(&self) -> std::result::Result<Value, TransportError> {
        let headers = self.client.headers()?;

        let resp = self
            .client
            .http
            .post(&self.client.url)
            .headers(headers)
            .json(self.request)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| TransportError::Decode {
            reason: format!("invalid JSON response: {e}"),
        })?;

        check_provider_error(&v)?;
        Ok(v)
    }
}

/// OpenRouter reports some upstream failures as a 2xx body carrying an
/// `error` object and no `choices`.
fn check_provider_error(v: &Value) -> std::result::Result<(), TransportError> {
    if v.get("choices").is_some() {
        return Ok(());
    }
    match v.get("error") {
        Some(err) => {
            let reason = err["message"]
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| err.to_string());
            Err(TransportError::Provider { reason })
        }
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
