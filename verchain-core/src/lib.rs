//! VERCHAIN Core - Version Chain Types
//!
//! Pure data structures shared by every other crate: chain records, system
//! metadata documents, the error taxonomy and tracker configuration. The only
//! behavior here is validation and (de)serialization.

use chrono::{DateTime, Utc};

mod config;
mod error;
mod namespace;
mod record;
mod source;
mod sysmeta;

pub use config::{
    validate_ttl_ms, TrackerConfig, DEFAULT_MAX_CACHE_RECORDS, DEFAULT_MAX_CHAIN_HOPS,
    DEFAULT_TTL_MS,
};
pub use error::{
    ChainError, ConfigError, RemoteError, StoreError, VerchainError, VerchainResult,
};
pub use namespace::{
    namespace_for, normalize_meta_service_url, DEFAULT_META_SERVICE_URL, NAMESPACE_PREFIX,
};
pub use record::{ChainRecord, Direction, FullChain, StoredRecord, VersionResult};
pub use source::MetadataSource;
pub use sysmeta::{LeanSysMeta, SysMetaData, SystemMetadata, PERSISTED_SYS_META_FIELDS};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Persistent identifier of one object version.
pub type Pid = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds for TTL values.
pub type DurationMs = i64;

/// Returns true if `pid` can be used as a chain identifier.
pub fn is_valid_pid(pid: &str) -> bool {
    !pid.trim().is_empty()
}
