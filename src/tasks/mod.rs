//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache.
//!
//! # Tasks
//! - Stats Reporter: emits windowed hit/miss snapshots at a fixed interval

mod stats_reporter;

pub use stats_reporter::{spawn_stats_reporter, ReporterHandle, StatsSink, TracingSink};
