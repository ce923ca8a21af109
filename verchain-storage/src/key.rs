//! Namespace-scoped store keys.
//!
//! A `NamespacedKey` cannot be built without a namespace, so a store backend
//! that only accepts these keys can never read or write outside its own
//! namespace.

/// Separator byte between namespace and pid. Never valid inside UTF-8 text,
/// so no namespace can be a byte-prefix of another namespace's keys.
pub const SEPARATOR: u8 = 0xFF;

/// A store key scoped to one namespace.
///
/// # Binary Format
///
/// - namespace bytes (UTF-8)
/// - separator (0xFF)
/// - pid bytes (UTF-8)
///
/// All keys of a namespace share the prefix `[namespace][0xFF]`, which lets
/// `clear()` be a prefix scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacedKey {
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    namespace: String,
    pid: String,
}

impl NamespacedKey {
    pub fn new(namespace: impl Into<String>, pid: impl Into<String>) -> Self {
        Self {
            inner: KeyInner {
                namespace: namespace.into(),
                pid: pid.into(),
            },
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn pid(&self) -> &str {
        &self.inner.pid
    }

    /// Encode this key for LMDB storage.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(self.inner.namespace.len() + 1 + self.inner.pid.len());
        bytes.extend_from_slice(self.inner.namespace.as_bytes());
        bytes.push(SEPARATOR);
        bytes.extend_from_slice(self.inner.pid.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if the separator is missing or either half is not
    /// valid UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let split = bytes.iter().position(|b| *b == SEPARATOR)?;
        let namespace = std::str::from_utf8(&bytes[..split]).ok()?;
        let pid = std::str::from_utf8(&bytes[split + 1..]).ok()?;
        Some(Self::new(namespace, pid))
    }

    /// Prefix shared by every key in `namespace`.
    pub fn namespace_prefix(namespace: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(namespace.len() + 1);
        bytes.extend_from_slice(namespace.as_bytes());
        bytes.push(SEPARATOR);
        bytes
    }

    /// Check if this key belongs to `namespace`.
    pub fn belongs_to(&self, namespace: &str) -> bool {
        self.inner.namespace == namespace
    }
}
