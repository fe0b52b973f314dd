//! Agent runtime for CareerLens.
//!
//! Turns unstructured profile text into validated structured data by
//! calling a remote text-generation service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌───────────────────┐     ┌───────────────────┐
//! │ ProfileAnalyzer  │────>│ GenerationClient  │────>│ RetryingTransport │
//! │ (Agent::execute) │     │ (chat completions)│     │ (backoff)         │
//! └────────┬─────────┘     └───────────────────┘     └───────────────────┘
//!          │ raw text
//!   ┌──────┴──────┐        ┌──────────────┐
//!   │  extract    │        │ ResultCache  │
//!   │ (parse +    │        │ (per agent)  │
//!   │  validate)  │        └──────────────┘
//!   └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- Generation client, prompts and usage accounting.
//! - [`extract`] -- Tolerant JSON location, validation and field repair.
//! - [`agent`] -- Agent trait, shared core, timing and prompt templating.
//! - [`profile`] -- Skill extraction and career assessment.
//! - [`config`] -- Environment-driven settings.
//! - [`error`] -- Agent error types.

pub mod agent;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod profile;

// Re-export the most commonly used types at the crate root.
pub use agent::{Agent, AgentCore, PerformanceStats, format_prompt};
pub use config::Settings;
pub use error::{AgentError, Result};
pub use extract::{
    FieldRepairer, FromItem, ParseStrategy, Repair, Shape, Validated, ValidationError,
    extract_list, extract_object, parse_payload,
};
pub use llm::{
    Completion, GenerationClient, GenerationOptions, LlmClientConfig, Message, Pricing, Prompt,
    Role, UsageStats,
};
pub use profile::{
    CareerAssessment, ExperienceLevel, ProfileAnalysis, ProfileAnalyzer, ProfileInput, Skill,
    SkillCategory, SkillLevel,
};
