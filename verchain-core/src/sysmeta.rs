//! System metadata documents returned by the remote metadata source.

use crate::{Direction, Pid};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata fields (besides the chain pointers) kept when a record is
/// persisted. Everything else is dropped to keep stored records small.
pub const PERSISTED_SYS_META_FIELDS: &[&str] = &[
    "formatId",
    "size",
    "checksum",
    "checksumAlgorithm",
    "rightsHolder",
    "dateUploaded",
    "dateSysMetadataModified",
    "fileName",
];

/// A system metadata document for one object version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetadata {
    pub identifier: Pid,
    pub data: SysMetaData,
}

/// The document body. Only the two chain pointers are interpreted; every
/// other field is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysMetaData {
    /// The version this one replaces (older neighbour).
    #[serde(default)]
    pub obsoletes: Option<Pid>,
    /// The version that replaces this one (newer neighbour).
    #[serde(default)]
    pub obsoleted_by: Option<Pid>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SystemMetadata {
    /// A document with no chain pointers.
    pub fn new(identifier: impl Into<Pid>) -> Self {
        Self {
            identifier: identifier.into(),
            data: SysMetaData::default(),
        }
    }

    pub fn with_obsoletes(mut self, pid: impl Into<Pid>) -> Self {
        self.data.obsoletes = Some(pid.into());
        self
    }

    pub fn with_obsoleted_by(mut self, pid: impl Into<Pid>) -> Self {
        self.data.obsoleted_by = Some(pid.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.extra.insert(key.into(), value);
        self
    }

    /// The neighbour in `direction`, treating empty strings as absent.
    pub fn neighbour(&self, direction: Direction) -> Option<&str> {
        let pointer = match direction {
            Direction::Forward => self.data.obsoleted_by.as_deref(),
            Direction::Backward => self.data.obsoletes.as_deref(),
        };
        pointer.filter(|p| !p.trim().is_empty())
    }

    /// Point the `direction` neighbour at `pid`.
    pub fn set_neighbour(&mut self, direction: Direction, pid: impl Into<Pid>) {
        let pointer = match direction {
            Direction::Forward => &mut self.data.obsoleted_by,
            Direction::Backward => &mut self.data.obsoletes,
        };
        *pointer = Some(pid.into());
    }

    /// Project the document down to the fields worth persisting.
    pub fn lean(&self) -> LeanSysMeta {
        let fields = PERSISTED_SYS_META_FIELDS
            .iter()
            .filter_map(|key| {
                self.data
                    .extra
                    .get(*key)
                    .filter(|v| !v.is_null())
                    .map(|v| ((*key).to_string(), v.clone()))
            })
            .collect();
        LeanSysMeta {
            obsoletes: self.data.obsoletes.clone(),
            obsoleted_by: self.data.obsoleted_by.clone(),
            fields,
        }
    }
}

/// The persisted subset of a [`SystemMetadata`] document.
///
/// The chain pointers are kept so that a record resurrected from the store
/// can continue a walk without a remote round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeanSysMeta {
    #[serde(default)]
    pub obsoletes: Option<Pid>,
    #[serde(default)]
    pub obsoleted_by: Option<Pid>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LeanSysMeta {
    /// Rebuild a document for `identifier` from the persisted subset.
    pub fn into_system_metadata(self, identifier: impl Into<Pid>) -> SystemMetadata {
        SystemMetadata {
            identifier: identifier.into(),
            data: SysMetaData {
                obsoletes: self.obsoletes,
                obsoleted_by: self.obsoleted_by,
                extra: self.fields,
            },
        }
    }
}
