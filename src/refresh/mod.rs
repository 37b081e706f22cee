//! Refresh Module
//!
//! Single-flight refresh coordination on top of the cache store.
//!
//! # Types
//! - `StampedeCache` - Shared cache handle with `get_or_refresh`
//! - `CacheBuilder` - Fluent constructor for `StampedeCache`

mod builder;
mod cache;
mod inflight;

pub use builder::CacheBuilder;
pub use cache::StampedeCache;
pub use inflight::RefreshOutcome;
