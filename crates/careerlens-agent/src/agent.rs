//! Agent lifecycle: timed execution, result caching and performance stats.
//!
//! An agent is a domain operation built on top of an [`AgentCore`], which
//! owns the clients it talks through and a private [`ResultCache`].  The
//! provided [`Agent::execute`] wraps the domain operation in a timer that
//! records its duration on success, on error and on cancellation.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use careerlens_adapters::SearchClient;
use careerlens_store::{CacheSnapshot, ResultCache};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{AgentError, Result};
use crate::llm::{GenerationClient, UsageStats};

// ---------------------------------------------------------------------------
// Agent trait
// ---------------------------------------------------------------------------

/// A unit of work that turns input into output via remote calls.
#[async_trait]
pub trait Agent: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Name used in logs.
    fn name(&self) -> &str;

    /// Shared state: clients, cache and timing.
    fn core(&self) -> &AgentCore;

    /// The domain operation.
    async fn run(&self, input: Self::Input) -> Result<Self::Output>;

    /// Run the domain operation under an execution timer.
    async fn execute(&self, input: Self::Input) -> Result<Self::Output> {
        let _timer = ExecutionTimer::start(self.name(), self.core());
        self.run(input).await
    }
}

/// Records elapsed time into its [`AgentCore`] when dropped.
struct ExecutionTimer<'a> {
    agent: &'a str,
    core: &'a AgentCore,
    started: Instant,
}

impl<'a> ExecutionTimer<'a> {
    fn start(agent: &'a str, core: &'a AgentCore) -> Self {
        debug!(agent, "execution started");
        Self {
            agent,
            core,
            started: Instant::now(),
        }
    }
}

impl Drop for ExecutionTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        self.core.record_execution(elapsed);
        info!(
            agent = self.agent,
            elapsed_secs = elapsed.as_secs_f64(),
            "execution completed"
        );
    }
}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

/// State every agent is built on.
#[derive(Debug)]
pub struct AgentCore {
    llm: Arc<GenerationClient>,
    search: Option<Arc<SearchClient>>,
    cache: ResultCache<Value>,
    last_execution: Mutex<Option<Duration>>,
}

impl AgentCore {
    /// Create a core with a default-sized cache and no search client.
    pub fn new(llm: Arc<GenerationClient>) -> Self {
        Self {
            llm,
            search: None,
            cache: ResultCache::builder("agent-results").build(),
            last_execution: Mutex::new(None),
        }
    }

    /// Attach a search client.
    pub fn with_search(mut self, search: Arc<SearchClient>) -> Self {
        self.search = Some(search);
        self
    }

    /// Replace the result cache.
    pub fn with_cache(mut self, cache: ResultCache<Value>) -> Self {
        self.cache = cache;
        self
    }

    pub fn llm(&self) -> &GenerationClient {
        &self.llm
    }

    pub fn search(&self) -> Option<&SearchClient> {
        self.search.as_deref()
    }

    /// Store `data` under `key`, replacing any previous entry.
    pub fn cache_result(&self, key: impl Into<String>, data: Value) {
        self.cache.insert(key, data);
    }

    /// The value under `key` if it is younger than `max_age`.
    pub fn cached_result(&self, key: &str, max_age: Duration) -> Option<Value> {
        self.cache.get(key, max_age)
    }

    /// Duration of the most recent [`Agent::execute`], if any.
    pub fn last_execution(&self) -> Option<Duration> {
        *self.last_execution.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record_execution(&self, elapsed: Duration) {
        *self.last_execution.lock().unwrap_or_else(|p| p.into_inner()) = Some(elapsed);
    }

    /// Snapshot of timing, model usage and cache activity.
    pub fn performance_stats(&self) -> PerformanceStats {
        PerformanceStats {
            execution_time: self.last_execution(),
            llm_usage: self.llm.usage_stats(),
            cache_size: self.cache.len(),
            cache: self.cache.stats(),
        }
    }
}

/// Point-in-time view of an agent's activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    /// Duration of the most recent execution; `None` before the first.
    pub execution_time: Option<Duration>,
    pub llm_usage: UsageStats,
    /// Entries in the result cache, stale ones included.
    pub cache_size: usize,
    /// Result cache lookups so far.
    pub cache: CacheSnapshot,
}

impl fmt::Display for PerformanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.execution_time {
            Some(t) => write!(f, "last run: {:.2}s, ", t.as_secs_f64())?,
            None => write!(f, "last run: never, ")?,
        }
        write!(
            f,
            "{}, cached results: {} ({})",
            self.llm_usage, self.cache_size, self.cache
        )
    }
}

// ---------------------------------------------------------------------------
// Prompt templating
// ---------------------------------------------------------------------------

/// Substitute `{name}` placeholders in `template`.
///
/// `{{` and `}}` produce literal braces.  A placeholder without a matching
/// variable is an error; substituted values are not re-scanned.
pub fn format_prompt(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let rest = &template[i + 1..];
                let end = rest.find('}').ok_or_else(|| AgentError::InvalidInput {
                    reason: format!("unclosed placeholder at byte {i}"),
                })?;
                let name = &rest[..end];
                let value = vars
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| AgentError::MissingTemplateVariable {
                        name: name.to_owned(),
                    })?;
                out.push_str(value);
                // Skip the name and the closing brace.
                for _ in 0..=name.chars().count() {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
