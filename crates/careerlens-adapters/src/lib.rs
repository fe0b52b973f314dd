//! Service adapters for CareerLens.
//!
//! - [`web_search`] -- Tavily search client with job-market and course
//!   presets, sent through the retrying transport.
//! - [`text`] -- Plain text helpers: normalisation, duration formatting,
//!   token-overlap similarity and pattern-based entity extraction.

pub mod error;
pub mod text;
pub mod web_search;

pub use error::{AdapterError, Result};
pub use text::{EntityKind, calculate_similarity, extract_entities, format_duration, normalize_text};
pub use web_search::{
    SearchClient, SearchClientConfig, SearchPreset, TAVILY_SEARCH_URL, default_preset_params,
};
