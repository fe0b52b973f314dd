//! Environment-driven settings.
//!
//! Every value comes from an environment variable with a documented
//! default, except the two API keys which are required.  Loading never
//! fails on a missing key; call [`Settings::validate`] before building
//! clients to fail fast.

use std::time::Duration;

use careerlens_adapters::{SearchClientConfig, TAVILY_SEARCH_URL, default_preset_params};
use careerlens_transport::RetryPolicy;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::llm::{DEFAULT_MODEL, LlmClientConfig, OPENROUTER_BASE_URL};

// ── variable names ──────────────────────────────────────────────────

pub const OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
pub const TAVILY_API_KEY: &str = "TAVILY_API_KEY";
pub const OPENROUTER_BASE_URL_VAR: &str = "OPENROUTER_BASE_URL";
pub const TAVILY_BASE_URL_VAR: &str = "TAVILY_BASE_URL";
pub const OPENROUTER_MODEL: &str = "OPENROUTER_MODEL";
pub const TAVILY_SEARCH_PARAMS_JOB: &str = "TAVILY_SEARCH_PARAMS_JOB";
pub const TAVILY_SEARCH_PARAMS_COURSE: &str = "TAVILY_SEARCH_PARAMS_COURSE";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const RATE_LIMIT_MINUTE: &str = "RATE_LIMIT_MINUTE";
pub const RATE_LIMIT_HOUR: &str = "RATE_LIMIT_HOUR";
pub const API_TIMEOUT: &str = "API_TIMEOUT";
pub const MAX_RETRIES: &str = "MAX_RETRIES";
pub const RETRY_DELAY: &str = "RETRY_DELAY";

// ── settings ────────────────────────────────────────────────────────

/// Process-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub openrouter_api_key: String,
    pub tavily_api_key: String,
    pub openrouter_base_url: String,
    pub tavily_base_url: String,
    pub openrouter_model: String,
    pub job_search_params: Map<String, Value>,
    pub course_search_params: Map<String, Value>,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Declared request budget per minute.  Not enforced.
    pub rate_limit_minute: u32,
    /// Declared request budget per hour.  Not enforced.
    pub rate_limit_hour: u32,
    /// Timeout for a single HTTP attempt.
    pub api_timeout: Duration,
    pub max_retries: u32,
    /// Delay before the first retry; later retries double it.
    pub retry_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openrouter_api_key: String::new(),
            tavily_api_key: String::new(),
            openrouter_base_url: OPENROUTER_BASE_URL.to_owned(),
            tavily_base_url: TAVILY_SEARCH_URL.to_owned(),
            openrouter_model: DEFAULT_MODEL.to_owned(),
            job_search_params: default_preset_params(),
            course_search_params: default_preset_params(),
            log_level: "INFO".to_owned(),
            rate_limit_minute: 60,
            rate_limit_hour: 1000,
            api_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl Settings {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables.  Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let settings = Self {
            openrouter_api_key: get(OPENROUTER_API_KEY).unwrap_or_default(),
            tavily_api_key: get(TAVILY_API_KEY).unwrap_or_default(),
            openrouter_base_url: match get(OPENROUTER_BASE_URL_VAR) {
                Some(v) => parse_url(OPENROUTER_BASE_URL_VAR, v)?,
                None => defaults.openrouter_base_url,
            },
            tavily_base_url: match get(TAVILY_BASE_URL_VAR) {
                Some(v) => parse_url(TAVILY_BASE_URL_VAR, v)?,
                None => defaults.tavily_base_url,
            },
            openrouter_model: get(OPENROUTER_MODEL).unwrap_or(defaults.openrouter_model),
            job_search_params: match get(TAVILY_SEARCH_PARAMS_JOB) {
                Some(v) => parse_params(TAVILY_SEARCH_PARAMS_JOB, &v)?,
                None => defaults.job_search_params,
            },
            course_search_params: match get(TAVILY_SEARCH_PARAMS_COURSE) {
                Some(v) => parse_params(TAVILY_SEARCH_PARAMS_COURSE, &v)?,
                None => defaults.course_search_params,
            },
            log_level: get(LOG_LEVEL).unwrap_or(defaults.log_level),
            rate_limit_minute: parse_or(
                RATE_LIMIT_MINUTE,
                get(RATE_LIMIT_MINUTE),
                defaults.rate_limit_minute,
            )?,
            rate_limit_hour: parse_or(
                RATE_LIMIT_HOUR,
                get(RATE_LIMIT_HOUR),
                defaults.rate_limit_hour,
            )?,
            api_timeout: match get(API_TIMEOUT) {
                Some(v) => Duration::from_secs(parse_number(API_TIMEOUT, &v)?),
                None => defaults.api_timeout,
            },
            max_retries: parse_or(MAX_RETRIES, get(MAX_RETRIES), defaults.max_retries)?,
            retry_delay: match get(RETRY_DELAY) {
                Some(v) => parse_seconds(RETRY_DELAY, &v)?,
                None => defaults.retry_delay,
            },
        };

        debug!(
            model = %settings.openrouter_model,
            max_retries = settings.max_retries,
            timeout_secs = settings.api_timeout.as_secs(),
            "settings loaded"
        );
        Ok(settings)
    }

    /// Fail with [`AgentError::MissingApiKey`] if a required key is absent.
    pub fn validate(&self) -> Result<()> {
        if self.tavily_api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: TAVILY_API_KEY.into(),
            });
        }
        if self.openrouter_api_key.trim().is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: OPENROUTER_API_KEY.into(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }

    /// Configuration for the generation client.
    pub fn llm_config(&self) -> LlmClientConfig {
        let mut config = LlmClientConfig::openrouter(&self.openrouter_api_key)
            .with_model(&self.openrouter_model);
        config.base_url = self.openrouter_base_url.clone();
        config.timeout = self.api_timeout;
        config.retry_policy = self.retry_policy();
        config
    }

    /// Configuration for the search client.
    pub fn search_config(&self) -> SearchClientConfig {
        let mut config = SearchClientConfig::tavily(&self.tavily_api_key);
        config.base_url = self.tavily_base_url.clone();
        config.timeout = self.api_timeout;
        config.retry_policy = self.retry_policy();
        config.job_params = self.job_search_params.clone();
        config.course_params = self.course_search_params.clone();
        config
    }
}

// ── parsing helpers ─────────────────────────────────────────────────

fn parse_number<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AgentError::config(format!("{name}: `{raw}` is not a valid number: {e}")))
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_number(name, &raw),
        None => Ok(default),
    }
}

fn parse_seconds(name: &str, raw: &str) -> Result<Duration> {
    let secs: f64 = parse_number(name, raw)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| AgentError::config(format!("{name}: `{raw}` is not a valid duration: {e}")))
}

fn parse_url(name: &str, raw: String) -> Result<String> {
    url::Url::parse(&raw)
        .map_err(|e| AgentError::config(format!("{name}: `{raw}` is not a valid URL: {e}")))?;
    Ok(raw)
}

fn parse_params(name: &str, raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AgentError::config(format!("{name}: expected a JSON object"))),
        Err(e) => Err(AgentError::config(format!("{name}: invalid JSON: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = load(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.openrouter_base_url, "https://openrouter.ai/api/v1");
        assert_eq!(s.openrouter_model, "openai/gpt-4o-mini");
        assert_eq!(s.job_search_params["max_results"], 10);
        assert_eq!(s.api_timeout, Duration::from_secs(30));
        assert_eq!(s.retry_delay, Duration::from_secs(1));
        assert_eq!(s.log_level, "INFO");
    }

    #[test]
    fn values_are_read_from_lookup() {
        let s = load(&[
            (OPENROUTER_API_KEY, "sk-or"),
            (TAVILY_API_KEY, "tvly"),
            (OPENROUTER_MODEL, "meta/llama"),
            (TAVILY_SEARCH_PARAMS_COURSE, r#"{"max_results": 4}"#),
            (API_TIMEOUT, "12"),
            (MAX_RETRIES, "5"),
            (RETRY_DELAY, "0.25"),
            (RATE_LIMIT_HOUR, "50"),
        ])
        .unwrap();

        assert_eq!(s.openrouter_api_key, "sk-or");
        assert_eq!(s.openrouter_model, "meta/llama");
        assert_eq!(s.course_search_params, json!({"max_results": 4}).as_object().unwrap().clone());
        assert_eq!(s.api_timeout, Duration::from_secs(12));
        assert_eq!(s.retry_policy(), RetryPolicy::new(5, Duration::from_millis(250)));
        assert_eq!(s.rate_limit_hour, 50);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn malformed_values_are_config_errors() {
        for vars in [
            [(API_TIMEOUT, "soon")],
            [(RETRY_DELAY, "-1")],
            [(MAX_RETRIES, "3.5")],
            [(TAVILY_SEARCH_PARAMS_JOB, "[1, 2]")],
            [(TAVILY_SEARCH_PARAMS_JOB, "{not json")],
            [(OPENROUTER_BASE_URL_VAR, "not a url")],
        ] {
            let err = load(&vars).unwrap_err();
            assert!(matches!(err, AgentError::ConfigError { .. }), "{vars:?}");
        }
    }

    #[test]
    fn validate_checks_tavily_first() {
        let err = load(&[]).unwrap().validate().unwrap_err();
        assert!(matches!(err, AgentError::MissingApiKey { ref provider } if provider == TAVILY_API_KEY));

        let err = load(&[(TAVILY_API_KEY, "tvly")]).unwrap().validate().unwrap_err();
        assert!(matches!(err, AgentError::MissingApiKey { ref provider } if provider == OPENROUTER_API_KEY));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let s = load(&[(OPENROUTER_MODEL, "  "), (TAVILY_API_KEY, "")]).unwrap();
        assert_eq!(s.openrouter_model, DEFAULT_MODEL);
        assert!(s.tavily_api_key.is_empty());
    }

    #[test]
    fn client_configs_follow_settings() {
        let s = load(&[
            (OPENROUTER_API_KEY, "sk-or"),
            (TAVILY_API_KEY, "tvly"),
            (OPENROUTER_BASE_URL_VAR, "http://127.0.0.1:8080/v1"),
            (MAX_RETRIES, "2"),
        ])
        .unwrap();

        let llm = s.llm_config();
        assert_eq!(llm.api_key, "sk-or");
        assert_eq!(llm.base_url, "http://127.0.0.1:8080/v1");
        assert_eq!(llm.retry_policy.max_retries(), 2);

        let search = s.search_config();
        assert_eq!(search.api_key, "tvly");
        assert_eq!(search.base_url, TAVILY_SEARCH_URL);
        assert_eq!(search.job_params, s.job_search_params);
    }
}
