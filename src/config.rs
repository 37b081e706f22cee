//! Configuration Module
//!
//! Cache options with defaults, optionally loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

// == Defaults ==
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_CAPACITY: usize = 1;
pub const DEFAULT_NAME: &str = "default_cache_name";
pub const DEFAULT_STAT_INTERVAL: Duration = Duration::from_secs(60);

/// Options fixed at cache construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Time-to-live applied on every write
    pub ttl: Duration,
    /// Maximum number of entries, 0 = unbounded
    pub capacity: usize,
    /// Label attached to stats snapshots
    pub name: String,
    /// Reporting window length, zero disables the reporter
    pub stat_interval: Duration,
}

impl CacheOptions {
    /// Creates options by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_SECS` - Entry TTL in seconds (default: 60)
    /// - `CACHE_CAPACITY` - Maximum entries, 0 = unbounded (default: 1)
    /// - `CACHE_NAME` - Name used in stats output (default: "default_cache_name")
    /// - `CACHE_STAT_INTERVAL_SECS` - Stats window in seconds, 0 disables (default: 60)
    ///
    /// Missing or unparsable values fall back to the default.
    pub fn from_env() -> Self {
        Self {
            ttl: env_parse("CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TTL),
            capacity: env_parse("CACHE_CAPACITY").unwrap_or(DEFAULT_CAPACITY),
            name: env::var("CACHE_NAME")
                .ok()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            stat_interval: env_parse("CACHE_STAT_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STAT_INTERVAL),
        }
    }

    /// Whether the background reporter should run.
    pub fn reporting_enabled(&self) -> bool {
        !self.stat_interval.is_zero()
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
            name: DEFAULT_NAME.to_string(),
            stat_interval: DEFAULT_STAT_INTERVAL,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
