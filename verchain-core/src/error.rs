//! Error types for VERCHAIN operations

use crate::Pid;
use thiserror::Error;

/// Configuration errors. Raised at construction time and never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid store provided to VersionTracker: {reason}")]
    InvalidStore { reason: String },
}

/// Remote metadata source errors. Never cached; the next call retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Failed to fetch system metadata for {pid}: {reason}")]
    FetchFailed { pid: Pid, reason: String },

    #[error("System metadata not found for {pid}")]
    NotFound { pid: Pid },

    #[error("Malformed system metadata for {pid}: {reason}")]
    Malformed { pid: Pid, reason: String },
}

/// Persistent record store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store backend error: {reason}")]
    Backend { reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    #[error("Deserialization error: {reason}")]
    Deserialization { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Logical chain errors: caller or data errors, not retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Cannot add version: {new} is already in the chain of {prev}")]
    AlreadyLinked { prev: Pid, new: Pid },

    #[error("Cannot add version: prevPid ({prev}) already has a newer version")]
    NotTip { prev: Pid },

    #[error("Cannot add version: newPid ({new}) already has version history")]
    NotIsolated { new: Pid },

    #[error("Cannot add version: {pid} cannot obsolete itself")]
    SelfLink { pid: Pid },

    #[error("Version chain of {pid} ends before offset {offset} ({available} hops known)")]
    ChainEnded {
        pid: Pid,
        offset: i64,
        available: usize,
    },

    #[error("Offset {offset} exceeds maximum chain hops limit of {max}")]
    OffsetOutOfRange { offset: i64, max: usize },

    #[error("Invalid PID provided")]
    InvalidPid,
}

/// Master error type for all VERCHAIN errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerchainError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

impl VerchainError {
    /// Returns true for errors that a later call may not hit again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Store(StoreError::Backend { .. }))
    }
}

/// Result type alias for VERCHAIN operations.
pub type VerchainResult<T> = Result<T, VerchainError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_linked_message() {
        let err = ChainError::AlreadyLinked {
            prev: "abc.3".to_string(),
            new: "abc.4".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot add version: abc.4 is already in the chain of abc.3"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "ttl_ms".to_string(),
            value: "-1".to_string(),
            reason: "ttl_ms must be greater than 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ttl_ms"));
        assert!(msg.contains("-1"));
    }

    #[test]
    fn test_master_error_from_conversions() {
        let remote: VerchainError = RemoteError::NotFound {
            pid: "p.1".to_string(),
        }
        .into();
        assert!(matches!(remote, VerchainError::Remote(_)));
        assert!(remote.is_retryable());

        let chain: VerchainError = ChainError::InvalidPid.into();
        assert!(matches!(chain, VerchainError::Chain(_)));
        assert!(!chain.is_retryable());

        let store: VerchainError = StoreError::LockPoisoned.into();
        assert!(!store.is_retryable());
    }

    #[test]
    fn test_errors_are_cloneable_for_fanout() {
        let err: VerchainError = RemoteError::FetchFailed {
            pid: "p.1".to_string(),
            reason: "Network error".to_string(),
        }
        .into();
        let copy = err.clone();
        assert_eq!(err, copy);
        assert!(copy.to_string().contains("Network error"));
    }
}
