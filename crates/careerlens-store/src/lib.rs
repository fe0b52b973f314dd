//! # careerlens-store
//!
//! Result caching for CareerLens agents.
//!
//! Each agent owns one [`ResultCache`]: a keyed map of payloads stamped with
//! their creation instant.  Reads are age-bounded by the caller; a stale
//! entry is reported as absent but left in place.  Growth is bounded by an
//! LRU capacity limit backed by `moka`.
//!
//! ```ignore
//! use std::time::Duration;
//! use careerlens_store::ResultCache;
//!
//! let cache: ResultCache<String> = ResultCache::builder("analyses")
//!     .max_capacity(256)
//!     .build();
//! cache.insert("profile:1", "done".to_string());
//! assert!(cache.get("profile:1", Duration::from_secs(60)).is_some());
//! ```

pub mod cache;

pub use cache::{CacheSnapshot, ResultCache, ResultCacheBuilder};
