//! The property pool: a keyed registry of shared records.
//!
//! A pool owns every record and the subscription broker, and wires the
//! two together: registering a record reconciles it against stored
//! subscriptions, subscribing reconciles the new pattern against stored
//! records. Pools are ordinary constructible objects — tests build a
//! fresh one — with a single lazy default instance for application code
//! ([`PropertyPool::global`]).
//!
//! All operations are synchronous and complete within the caller's
//! turn. State is guarded by locks so a multi-threaded host cannot
//! corrupt it, but the design assumes a single game-tick writer;
//! `clear()` is the reset barrier.

use crate::bindings::{BoundProperties, DeclareProperties, PropertySlot};
use crate::error::{PropertyError, Result};
use crate::format::FormatSpec;
use crate::pattern::Pattern;
use crate::record::{Property, PropertyCell, PropertyHandle};
use crate::subscriptions::{
    ChangeHandler, PropertyStream, StreamHandler, SubscriptionId, SubscriptionManager,
};
use crate::types::{is_valid_name, Key, PropertyId};
use crate::value::{PropertyValue, Value, ValueKind};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Erased registration input (the typed shortcut is
/// [`PropertyPool::create_or_get`]).
#[derive(Clone, Debug)]
pub struct PropertyRegistration {
    pub key: String,
    pub kind: ValueKind,
    /// Seed value; also counts as the record's prior value for change
    /// detection. `None` seeds the kind's zero and leaves the record
    /// unprimed.
    pub default: Option<Value>,
    /// Display format spec text, parsed at registration.
    pub format: Option<String>,
    /// Group tag; a leading `$` is accepted and stripped.
    pub group: Option<String>,
    pub locked: bool,
}

impl PropertyRegistration {
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

/// Process-wide keyed store of property records.
pub struct PropertyPool {
    records: RwLock<IndexMap<Key, PropertyHandle>>,
    broker: SubscriptionManager,
    next_property_id: AtomicU64,
}

static GLOBAL_POOL: Lazy<PropertyPool> = Lazy::new(PropertyPool::new);

impl PropertyPool {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(IndexMap::new()),
            broker: SubscriptionManager::new(),
            next_property_id: AtomicU64::new(1),
        }
    }

    /// The application-wide default pool.
    pub fn global() -> &'static PropertyPool {
        &GLOBAL_POOL
    }

    // --- Registration ---

    /// Create a record, or share the existing one registered under the
    /// same key.
    ///
    /// Sharing asserts the kind: an existing record of a different kind
    /// is a [`PropertyError::KindConflict`]. When sharing, the incoming
    /// default/format/group are ignored — the first registration wins.
    pub fn register(&self, registration: PropertyRegistration) -> Result<PropertyHandle> {
        let key = Key::parse(&registration.key)?;
        if let Some(default) = &registration.default {
            if default.kind() != registration.kind {
                return Err(PropertyError::TypeMismatch {
                    key,
                    expected: registration.kind,
                    got: default.kind(),
                });
            }
        }
        let format = registration
            .format
            .as_deref()
            .map(FormatSpec::parse)
            .transpose()?;
        let group = registration
            .group
            .as_deref()
            .map(normalize_group)
            .transpose()?;

        let (handle, created) = {
            let mut records = self.records.write();
            if let Some(existing) = records.get(&key) {
                if existing.kind() != registration.kind {
                    warn!(%key, existing = %existing.kind(), requested = %registration.kind,
                        "kind conflict on registration");
                    return Err(PropertyError::KindConflict {
                        key,
                        existing: existing.kind(),
                        requested: registration.kind,
                    });
                }
                trace!(%key, "sharing existing property");
                (existing.clone(), false)
            } else {
                let id = PropertyId(self.next_property_id.fetch_add(1, Ordering::SeqCst));
                let cell = PropertyCell::new(
                    id,
                    key.clone(),
                    registration.kind,
                    registration.default,
                    format,
                    group,
                    registration.locked,
                );
                let handle = PropertyHandle::new(Arc::new(cell));
                records.insert(key.clone(), handle.clone());
                trace!(%key, kind = %registration.kind, "property registered");
                (handle, true)
            }
        };

        if created {
            self.broker.attach_matching(&handle);
        }
        Ok(handle)
    }

    /// Typed create-or-share with a seed value.
    pub fn create_or_get<T: PropertyValue>(&self, key: &str, default: T) -> Result<Property<T>> {
        let handle =
            self.register(PropertyRegistration::new(key, T::KIND).with_default(default.into_value()))?;
        Property::from_handle(handle)
    }

    /// Typed create-or-share carrying a group tag.
    pub fn create_or_get_grouped<T: PropertyValue>(
        &self,
        key: &str,
        default: T,
        group: &str,
    ) -> Result<Property<T>> {
        let handle = self.register(
            PropertyRegistration::new(key, T::KIND)
                .with_default(default.into_value())
                .with_group(group),
        )?;
        Property::from_handle(handle)
    }

    // --- Lookup ---

    /// Typed fetch. `UnknownKey` when absent, `TypeMismatch` when the
    /// record holds a different kind; both recoverable.
    pub fn get<T: PropertyValue>(&self, key: &str) -> Result<Property<T>> {
        let handle = self.get_dyn(key)?;
        Property::from_handle(handle).map_err(|e| {
            warn!(%key, requested = %T::KIND, "typed fetch against incompatible record");
            e
        })
    }

    /// Erased fetch.
    pub fn get_dyn(&self, key: &str) -> Result<PropertyHandle> {
        let parsed = Key::parse(key)?;
        match self.records.read().get(&parsed) {
            Some(handle) => Ok(handle.clone()),
            None => {
                warn!(key = %parsed, "unknown property key");
                Err(PropertyError::UnknownKey(parsed))
            }
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        Key::parse(key)
            .map(|k| self.records.read().contains_key(&k))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Registered keys in insertion order.
    pub fn keys(&self) -> Vec<Key> {
        self.records.read().keys().cloned().collect()
    }

    /// Handles to every record, insertion order. This is the walking
    /// surface external serializers use.
    pub fn handles(&self) -> Vec<PropertyHandle> {
        self.records.read().values().cloned().collect()
    }

    // --- Removal ---

    /// Remove one record. Subscriber bindings attached to it die with
    /// it; broker-level subscriptions stay for other records.
    pub fn unregister(&self, key: &str) -> Result<()> {
        let parsed = Key::parse(key)?;
        let removed = self.records.write().shift_remove(&parsed);
        match removed {
            Some(handle) => {
                handle.clear_subscribers();
                debug!(key = %parsed, "property unregistered");
                Ok(())
            }
            None => Err(PropertyError::UnknownKey(parsed)),
        }
    }

    /// Wipe every record and every subscription. Used for full-state
    /// resets such as level reloads; handles held across this barrier
    /// must be treated as invalid.
    pub fn clear(&self) {
        let mut records = self.records.write();
        for handle in records.values() {
            handle.clear_subscribers();
        }
        let count = records.len();
        records.clear();
        drop(records);
        self.broker.clear();
        debug!(records = count, "pool cleared");
    }

    // --- Subscriptions ---

    /// Subscribe a handler to every record whose key (or, with a `$`
    /// pattern, group tag) matches. Records registered later attach
    /// automatically. The subscription lives until [`unsubscribe`] or
    /// [`clear`] — nothing releases it when the consumer goes away.
    ///
    /// [`unsubscribe`]: PropertyPool::unsubscribe
    /// [`clear`]: PropertyPool::clear
    pub fn subscribe<H>(&self, pattern: &str, handler: H) -> Result<SubscriptionId>
    where
        H: ChangeHandler + 'static,
    {
        self.subscribe_arc(pattern, Arc::new(handler))
    }

    /// [`subscribe`](PropertyPool::subscribe) for an already-shared
    /// handler object.
    pub fn subscribe_arc(
        &self,
        pattern: &str,
        handler: Arc<dyn ChangeHandler>,
    ) -> Result<SubscriptionId> {
        let compiled = Pattern::compile(pattern)?;
        let id = self.broker.add(compiled, handler);
        self.broker.attach_existing(id, self.handles());
        Ok(id)
    }

    /// Channel-backed subscription for consumers that poll per frame.
    pub fn subscribe_stream(&self, pattern: &str, capacity: usize) -> Result<PropertyStream> {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let live = Arc::new(AtomicBool::new(true));
        let handler = Arc::new(StreamHandler::new(sender, live.clone()));
        let id = self.subscribe_arc(pattern, handler)?;
        Ok(PropertyStream::new(id, receiver, live))
    }

    /// Remove a subscription and detach its handler from every record.
    /// Returns false for unknown ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        if self.broker.remove(id).is_none() {
            return false;
        }
        for handle in self.handles() {
            handle.detach(id);
        }
        true
    }

    pub fn subscription_count(&self) -> usize {
        self.broker.count()
    }

    // --- Declarative binding ---

    /// Bind a type's declared slot table; see the `bindings` module.
    pub fn bind<D: DeclareProperties>(&self) -> Result<BoundProperties> {
        self.bind_slots(std::any::type_name::<D>(), D::property_slots())
    }

    /// Bind an explicit slot table under an owner name (used in
    /// registration-failure diagnostics).
    pub fn bind_slots(&self, owner: &str, slots: Vec<PropertySlot>) -> Result<BoundProperties> {
        crate::bindings::bind_slots(self, owner, slots)
    }

    /// Re-run subscription reconciliation for one record. Attachment is
    /// idempotent, so calling this for an already-bound record is safe.
    pub(crate) fn reconcile(&self, handle: &PropertyHandle) {
        self.broker.attach_matching(handle);
    }

    // --- Diagnostics ---

    /// Human-readable listing of every record in insertion order.
    pub fn dump(&self) -> String {
        let records = self.records.read();
        let mut out = String::new();
        for handle in records.values() {
            let _ = writeln!(out, "{}", handle);
        }
        out
    }
}

impl Default for PropertyPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip the `$` addressing prefix and validate a group tag.
fn normalize_group(group: &str) -> Result<String> {
    let bare = group.strip_prefix('$').unwrap_or(group);
    if !is_valid_name(bare) {
        return Err(PropertyError::InvalidKey(format!("group tag '{}'", group)));
    }
    Ok(bare.to_string())
}
