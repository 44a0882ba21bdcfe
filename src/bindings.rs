//! Declarative slot tables: "declare once, wire automatically" without
//! reflection.
//!
//! A type lists its registration slots in an explicit table
//! ([`DeclareProperties::property_slots`]) and binds it at construction
//! time with [`crate::PropertyPool::bind`]. Every instance of every
//! declaring type then shares one record per key, and the wiring stays
//! visible in code instead of living in runtime type metadata.
//!
//! Binding is idempotent and fails loudly: the first malformed slot
//! (bad key, bad format spec, default of the wrong kind, kind conflict
//! with an existing record) aborts with a [`PropertyError::Registration`]
//! naming the owning type and slot, because a half-bound object is
//! unsafe to run.

use crate::error::{PropertyError, Result};
use crate::pool::{PropertyPool, PropertyRegistration};
use crate::record::{Property, PropertyHandle};
use crate::value::{PropertyValue, Value, ValueKind};
use indexmap::IndexMap;
use tracing::debug;

/// One declarative registration slot: target key plus optional default,
/// display format and group tag.
#[derive(Clone, Debug)]
pub struct PropertySlot {
    pub key: String,
    pub kind: ValueKind,
    pub default: Option<Value>,
    pub format: Option<String>,
    pub group: Option<String>,
    pub locked: bool,
}

impl PropertySlot {
    pub fn new(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            kind,
            default: None,
            format: None,
            group: None,
            locked: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

impl From<PropertySlot> for PropertyRegistration {
    fn from(slot: PropertySlot) -> Self {
        PropertyRegistration {
            key: slot.key,
            kind: slot.kind,
            default: slot.default,
            format: slot.format,
            group: slot.group,
            locked: slot.locked,
        }
    }
}

/// A type that declares registration slots.
pub trait DeclareProperties {
    fn property_slots() -> Vec<PropertySlot>;
}

/// The records a slot table resolved to, keyed by slot key.
#[derive(Debug)]
pub struct BoundProperties {
    owner: String,
    handles: IndexMap<String, PropertyHandle>,
}

impl BoundProperties {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn handle(&self, key: &str) -> Option<&PropertyHandle> {
        self.handles.get(key)
    }

    /// Typed view of one bound record.
    pub fn typed<T: PropertyValue>(&self, key: &str) -> Result<Property<T>> {
        match self.handles.get(key) {
            Some(handle) => Property::from_handle(handle.clone()),
            None => Err(PropertyError::UnknownKey(crate::types::Key::parse(key)?)),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyHandle)> {
        self.handles.iter().map(|(k, h)| (k.as_str(), h))
    }
}

/// Bind every slot in declaration order, aborting on the first
/// malformed one.
pub(crate) fn bind_slots(
    pool: &PropertyPool,
    owner: &str,
    slots: Vec<PropertySlot>,
) -> Result<BoundProperties> {
    let mut handles = IndexMap::new();
    for slot in slots {
        let key = slot.key.clone();
        let handle = pool
            .register(PropertyRegistration::from(slot))
            .map_err(|cause| PropertyError::Registration {
                owner: owner.to_string(),
                slot: key.clone(),
                reason: cause.to_string(),
            })?;
        // Shared records need reconciliation re-run too; attachment is
        // idempotent, so fresh ones can take the same path.
        pool.reconcile(&handle);
        handles.insert(key, handle);
    }
    debug!(owner, slots = handles.len(), "slot table bound");
    Ok(BoundProperties {
        owner: owner.to_string(),
        handles,
    })
}
