//! Remote metadata source trait.

use crate::{SystemMetadata, VerchainResult};
use async_trait::async_trait;

/// The remote source of truth for version pointers.
///
/// Implementations wrap the actual network call. They must reject on network,
/// not-found and parse failures (see [`crate::RemoteError`]) and must never
/// return a partially filled document.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch the system metadata document for `pid`.
    async fn fetch(&self, pid: &str) -> VerchainResult<SystemMetadata>;
}
