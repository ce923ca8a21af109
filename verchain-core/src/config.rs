//! Tracker configuration
//!
//! Configuration is plain data with a `validate()` pass. Values are signed so
//! that nonsensical input (negative TTLs, negative limits) can be reported as
//! configuration errors instead of silently wrapping.

use crate::{normalize_meta_service_url, ConfigError, DurationMs, VerchainResult};
use serde::{Deserialize, Serialize};

/// Default record TTL: one day.
pub const DEFAULT_TTL_MS: DurationMs = 24 * 60 * 60 * 1000;

/// Default hard ceiling on hops walked per traversal.
pub const DEFAULT_MAX_CHAIN_HOPS: i64 = 200;

/// Default in-memory cache capacity.
pub const DEFAULT_MAX_CACHE_RECORDS: i64 = 5000;

/// Configuration for one version tracker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Remote metadata endpoint. Normalized on validation.
    pub meta_service_url: String,
    /// Maximum age of a persisted record before it is treated as absent.
    pub ttl_ms: DurationMs,
    /// Maximum hops a single traversal may walk in one direction.
    pub max_chain_hops: i64,
    /// Maximum records held in memory before LRU eviction.
    pub max_cache_records: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            meta_service_url: normalize_meta_service_url(""),
            ttl_ms: DEFAULT_TTL_MS,
            max_chain_hops: DEFAULT_MAX_CHAIN_HOPS,
            max_cache_records: DEFAULT_MAX_CACHE_RECORDS,
        }
    }
}

impl TrackerConfig {
    /// Create a config with default values for the given endpoint.
    pub fn new(meta_service_url: impl AsRef<str>) -> Self {
        Self::default().with_meta_service_url(meta_service_url)
    }

    /// Create a TrackerConfig from environment variables.
    ///
    /// Environment variables:
    /// - `VERCHAIN_META_SERVICE_URL`: metadata endpoint (default: DataONE CN)
    /// - `VERCHAIN_TTL_MS`: record TTL in milliseconds (default: 86400000)
    /// - `VERCHAIN_MAX_CHAIN_HOPS`: hop ceiling per traversal (default: 200)
    /// - `VERCHAIN_MAX_CACHE_RECORDS`: in-memory capacity (default: 5000)
    ///
    /// Unparseable values fall back to the defaults; out-of-range values are
    /// kept so that `validate()` can report them.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TrackerConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let meta_service_url = lookup("VERCHAIN_META_SERVICE_URL")
            .map(|s| normalize_meta_service_url(&s))
            .unwrap_or(defaults.meta_service_url);

        let ttl_ms = lookup("VERCHAIN_TTL_MS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.ttl_ms);

        let max_chain_hops = lookup("VERCHAIN_MAX_CHAIN_HOPS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_chain_hops);

        let max_cache_records = lookup("VERCHAIN_MAX_CACHE_RECORDS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_cache_records);

        Self {
            meta_service_url,
            ttl_ms,
            max_chain_hops,
            max_cache_records,
        }
    }

    pub fn with_meta_service_url(mut self, url: impl AsRef<str>) -> Self {
        self.meta_service_url = normalize_meta_service_url(url.as_ref());
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: DurationMs) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn with_max_chain_hops(mut self, hops: i64) -> Self {
        self.max_chain_hops = hops;
        self
    }

    pub fn with_max_cache_records(mut self, records: i64) -> Self {
        self.max_cache_records = records;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> VerchainResult<()> {
        validate_ttl_ms(self.ttl_ms)?;
        validate_positive("max_chain_hops", self.max_chain_hops)?;
        validate_positive("max_cache_records", self.max_cache_records)?;
        Ok(())
    }
}

/// Validate a TTL value (shared with runtime TTL changes).
pub fn validate_ttl_ms(ttl_ms: DurationMs) -> VerchainResult<()> {
    validate_positive("ttl_ms", ttl_ms)
}

fn validate_positive(field: &str, value: i64) -> VerchainResult<()> {
    if value <= 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("{} must be greater than 0", field),
        }
        .into());
    }
    Ok(())
}
