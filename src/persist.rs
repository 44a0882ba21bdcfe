//! Snapshot boundary for clusters of related records.
//!
//! Tunable gameplay constants live in the pool like any other record;
//! this module walks them out into a plain entry list and back. JSON is
//! the hand-editable form, MessagePack the compact one. Applying a
//! snapshot writes through the normal set path, so subscribers observe
//! loaded values the same way they observe gameplay writes.

use crate::error::Result;
use crate::pattern::Pattern;
use crate::pool::{PropertyPool, PropertyRegistration};
use crate::types::Key;
use crate::value::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Snapshot encoding format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotEncoding {
    Json,
    MessagePack,
}

/// One captured record: reflection-free metadata plus the value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: Key,
    pub kind: ValueKind,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// A captured cluster of records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Walk the pool (insertion order) into a snapshot. A pattern
    /// restricts capture to matching records; `None` captures all.
    pub fn capture(pool: &PropertyPool, pattern: Option<&str>) -> Result<Self> {
        let filter = pattern.map(Pattern::compile).transpose()?;
        let mut entries = Vec::new();
        for handle in pool.handles() {
            let selected = filter
                .as_ref()
                .map_or(true, |p| p.matches_record(handle.key(), handle.group()));
            if !selected {
                continue;
            }
            entries.push(SnapshotEntry {
                key: handle.key().clone(),
                kind: handle.kind(),
                value: handle.value(),
                format: handle.format_spec().map(|spec| spec.to_string()),
                group: handle.group().map(str::to_string),
            });
        }
        Ok(Snapshot { entries })
    }

    /// Write every entry back into the pool. Missing records are
    /// registered first (carrying the snapshot's format and group), then
    /// each value goes through the full set path so matching subscribers
    /// fire. Stops at the first incompatible entry.
    pub fn apply(&self, pool: &PropertyPool) -> Result<usize> {
        for entry in &self.entries {
            if !pool.exists(entry.key.as_str()) {
                let mut registration =
                    PropertyRegistration::new(entry.key.as_str(), entry.kind);
                registration.format = entry.format.clone();
                registration.group = entry.group.clone();
                pool.register(registration)?;
            }
            pool.get_dyn(entry.key.as_str())?.set(entry.value.clone())?;
        }
        debug!(entries = self.entries.len(), "snapshot applied");
        Ok(self.entries.len())
    }

    pub fn to_bytes(&self, encoding: SnapshotEncoding) -> Result<Vec<u8>> {
        match encoding {
            SnapshotEncoding::Json => Ok(serde_json::to_vec_pretty(self)?),
            SnapshotEncoding::MessagePack => Ok(rmp_serde::to_vec(self)?),
        }
    }

    pub fn from_bytes(bytes: &[u8], encoding: SnapshotEncoding) -> Result<Self> {
        match encoding {
            SnapshotEncoding::Json => Ok(serde_json::from_slice(bytes)?),
            SnapshotEncoding::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>, encoding: SnapshotEncoding) -> Result<()> {
        fs::write(path, self.to_bytes(encoding)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>, encoding: SnapshotEncoding) -> Result<Self> {
        Snapshot::from_bytes(&fs::read(path)?, encoding)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
