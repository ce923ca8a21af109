//! Endpoint normalization and persistent-store namespace derivation.
//!
//! Every tracker instance owns exactly one namespace in the persistent store.
//! The namespace is a pure function of the normalized endpoint URL, so a
//! restarted process pointed at the same endpoint reuses the same durable
//! records while two endpoints never share state.

use sha2::{Digest, Sha256};

/// Endpoint used when no (or an empty) metadata service URL is configured.
pub const DEFAULT_META_SERVICE_URL: &str = "https://cn.dataone.org/cn/v2/meta/";

/// Prefix of every namespace produced by [`namespace_for`].
pub const NAMESPACE_PREFIX: &str = "vt_";

/// Normalize a metadata service URL: trim whitespace, fall back to the
/// default endpoint when empty, and guarantee a trailing slash.
pub fn normalize_meta_service_url(url: &str) -> String {
    let trimmed = url.trim();
    let base = if trimmed.is_empty() {
        DEFAULT_META_SERVICE_URL
    } else {
        trimmed
    };
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    }
}

/// Derive the store namespace for an endpoint.
///
/// Format: `vt_` followed by the first 16 bytes of SHA-256 over the
/// normalized URL, hex encoded (32 lowercase hex characters).
pub fn namespace_for(meta_service_url: &str) -> String {
    let normalized = normalize_meta_service_url(meta_service_url);
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{}{}", NAMESPACE_PREFIX, hex::encode(&digest[..16]))
}
