//! Web search client for the Tavily search API.
//!
//! Every request is a JSON `POST` of `{api_key, query, ...params}` sent
//! through a [`RetryingTransport`].  The response body is returned as-is;
//! its shape belongs to the search provider.
//!
//! Two presets layer a curated domain allow-list over the configured base
//! parameters:
//!   - [`SearchPreset::JobMarket`] -- job boards and labour statistics
//!   - [`SearchPreset::Courses`] -- online learning platforms

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use careerlens_transport::{Call, RetryPolicy, RetryingTransport, Sleeper, TransportError};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::{AdapterError, Result};

// ═══════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════

/// Tavily search endpoint.
pub const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Service name used in logs and errors.
const SERVICE: &str = "tavily";

/// Sources consulted for job market research.
const JOB_MARKET_DOMAINS: &[&str] = &[
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
    "monster.com",
    "dice.com",
    "bls.gov",
];

/// Sources consulted for courses and learning resources.
const COURSE_DOMAINS: &[&str] = &[
    "coursera.org",
    "udemy.com",
    "edx.org",
    "pluralsight.com",
    "udacity.com",
    "linkedin.com/learning",
    "skillshare.com",
];

/// Base parameters used by both presets unless configured otherwise.
pub fn default_preset_params() -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("search_depth".into(), json!("advanced"));
    params.insert("max_results".into(), json!(10));
    params
}

// ═══════════════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════════════

/// Connection settings for [`SearchClient`].
#[derive(Debug, Clone)]
pub struct SearchClientConfig {
    /// Tavily API key.
    pub api_key: String,
    /// Search endpoint URL.
    pub base_url: String,
    /// Timeout for a single attempt.
    pub timeout: Duration,
    /// Backoff policy applied to every search.
    pub retry_policy: RetryPolicy,
    /// Base parameters for [`SearchPreset::JobMarket`].
    pub job_params: Map<String, Value>,
    /// Base parameters for [`SearchPreset::Courses`].
    pub course_params: Map<String, Value>,
}

impl SearchClientConfig {
    /// Configuration for the public Tavily endpoint with default presets.
    pub fn tavily(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: TAVILY_SEARCH_URL.to_owned(),
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            job_params: default_preset_params(),
            course_params: default_preset_params(),
        }
    }
}

/// Fixed parameter sets tailored to a query purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPreset {
    /// Job postings, salaries and labour market data.
    JobMarket,
    /// Online courses and learning resources.
    Courses,
}

impl SearchPreset {
    fn domains(self) -> &'static [&'static str] {
        match self {
            Self::JobMarket => JOB_MARKET_DOMAINS,
            Self::Courses => COURSE_DOMAINS,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Client
// ═══════════════════════════════════════════════════════════════════════

/// Retrying client for the search endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    config: Arc<SearchClientConfig>,
    http: reqwest::Client,
    transport: RetryingTransport,
}

impl SearchClient {
    /// Create a client.  Fails if the API key is blank or the endpoint is
    /// not a valid URL.
    pub fn new(config: SearchClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AdapterError::MissingApiKey {
                service: SERVICE.into(),
            });
        }

        url::Url::parse(&config.base_url).map_err(|e| {
            AdapterError::ConfigError(format!("invalid search url `{}`: {e}", config.base_url))
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        let transport = RetryingTransport::new(SERVICE, config.retry_policy);

        Ok(Self {
            config: Arc::new(config),
            http,
            transport,
        })
    }

    /// Replace the sleeper used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.transport = self.transport.with_sleeper(sleeper);
        self
    }

    /// Run a search with caller-supplied parameters.
    ///
    /// `api_key` and `query` always come from the client and the argument;
    /// entries with those names in `params` are ignored.
    pub async fn search(&self, query: &str, params: Map<String, Value>) -> Result<Value> {
        let payload = self.build_payload(query, params);

        debug!(query, "performing search");

        let call = SearchCall {
            http: &self.http,
            url: &self.config.base_url,
            payload: &payload,
        };
        let result = self.transport.execute(&call).await?;

        info!(query, "search successful");
        Ok(result)
    }

    /// Search job boards and labour statistics sources.
    pub async fn search_job_market(&self, query: &str) -> Result<Value> {
        self.search(query, self.preset_params(SearchPreset::JobMarket))
            .await
    }

    /// Search online learning platforms.
    pub async fn search_courses(&self, query: &str) -> Result<Value> {
        self.search(query, self.preset_params(SearchPreset::Courses))
            .await
    }

    /// Parameters sent for `preset`: the configured base parameters with
    /// the preset's domain allow-list and advanced depth applied on top.
    pub fn preset_params(&self, preset: SearchPreset) -> Map<String, Value> {
        let mut params = match preset {
            SearchPreset::JobMarket => self.config.job_params.clone(),
            SearchPreset::Courses => self.config.course_params.clone(),
        };
        params.insert("include_domains".into(), json!(preset.domains()));
        params.insert("search_depth".into(), json!("advanced"));
        params
    }

    fn build_payload(&self, query: &str, params: Map<String, Value>) -> Value {
        let mut payload = params;
        payload.insert("api_key".into(), json!(self.config.api_key));
        payload.insert("query".into(), json!(query));
        Value::Object(payload)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Single attempt
// ═══════════════════════════════════════════════════════════════════════

struct SearchCall<'a> {
    http: &'a reqwest::Client,
    url: &'a str,
    payload: &'a Value,
}

#[async_trait]
impl Call for SearchCall<'_> {
    type Output = Value;

    async fn attempt(&self) -> std::result::Result<Value, TransportError> {
        let response = self.http.post(self.url).json(self.payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|e| TransportError::Decode {
            reason: format!("invalid search response: {e}"),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
