//! Property cells and the erased/typed handles over them.
//!
//! A [`PropertyCell`] is the shared record stored in the pool: a value
//! of a fixed [`ValueKind`] plus its display format, group tag,
//! write-lock flag, transform/trigger hooks and attached subscribers.
//! [`PropertyHandle`] is the erased public surface; [`Property<T>`] is
//! the typed view game code holds.
//!
//! The write path is: kind check → transform hooks (in order, each may
//! rewrite the incoming value when its predicate matches) → commit →
//! trigger hooks (side effects only) → change fan-out. The change event
//! fires only when the committed value differs from the previous one;
//! a record that was never explicitly set has no prior value, so its
//! first set always fires with `old == None`. Transforms run under the
//! cell lock and must stay pure rewrites; triggers and subscribers run
//! outside it and may re-enter the pool.

use crate::error::{PropertyError, Result};
use crate::format::FormatSpec;
use crate::subscriptions::{ChangeHandler, SubscriptionId, ValueChange};
use crate::types::{Key, PropertyId};
use crate::value::{ArithOp, PropertyValue, Value, ValueKind, ValueOpError};
use glam::Vec2;
use parking_lot::RwLock;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;
type Trigger = Arc<dyn Fn(&Value) + Send + Sync>;

/// Mutable part of a cell, guarded by one lock.
struct CellState {
    value: Value,
    /// False until the first explicit set; a registration default primes
    /// the record, a kind-zero seed does not.
    primed: bool,
    transforms: Vec<(Predicate, Transform)>,
    triggers: Vec<(Predicate, Trigger)>,
    /// Attached change handlers, ascending by subscription id, which is
    /// subscription-registration order.
    subscribers: Vec<(SubscriptionId, Arc<dyn ChangeHandler>)>,
}

/// The shared record registered under a key.
pub(crate) struct PropertyCell {
    id: PropertyId,
    key: Key,
    kind: ValueKind,
    group: Option<String>,
    format: Option<FormatSpec>,
    locked: AtomicBool,
    state: RwLock<CellState>,
}

/// Everything a committed write produced; consumed outside the lock.
struct SetOutcome {
    new_value: Value,
    triggers: Vec<Trigger>,
    change: Option<ValueChange>,
    subscribers: Vec<Arc<dyn ChangeHandler>>,
}

impl PropertyCell {
    pub(crate) fn new(
        id: PropertyId,
        key: Key,
        kind: ValueKind,
        default: Option<Value>,
        format: Option<FormatSpec>,
        group: Option<String>,
        locked: bool,
    ) -> Self {
        let primed = default.is_some();
        let value = default.unwrap_or_else(|| kind.zero());
        Self {
            id,
            key,
            kind,
            group,
            format,
            locked: AtomicBool::new(locked),
            state: RwLock::new(CellState {
                value,
                primed,
                transforms: Vec::new(),
                triggers: Vec::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Run the write path up to (not including) trigger and subscriber
    /// invocation; those happen outside the lock.
    fn write(&self, incoming: Value) -> Result<SetOutcome> {
        if self.locked.load(Ordering::Acquire) {
            return Err(PropertyError::Locked(self.key.clone()));
        }
        if incoming.kind() != self.kind {
            return Err(PropertyError::TypeMismatch {
                key: self.key.clone(),
                expected: self.kind,
                got: incoming.kind(),
            });
        }

        let mut state = self.state.write();

        let mut next = incoming;
        for (predicate, transform) in &state.transforms {
            if predicate(&next) {
                next = transform(next);
            }
        }
        if next.kind() != self.kind {
            return Err(PropertyError::TypeMismatch {
                key: self.key.clone(),
                expected: self.kind,
                got: next.kind(),
            });
        }

        let old = std::mem::replace(&mut state.value, next.clone());
        let was_primed = std::mem::replace(&mut state.primed, true);

        let triggers = state
            .triggers
            .iter()
            .filter(|(predicate, _)| predicate(&next))
            .map(|(_, trigger)| trigger.clone())
            .collect();

        let changed = !was_primed || old != next;
        let (change, subscribers) = if changed {
            (
                Some(ValueChange {
                    old: was_primed.then_some(old),
                    new: next.clone(),
                }),
                state
                    .subscribers
                    .iter()
                    .map(|(_, handler)| handler.clone())
                    .collect(),
            )
        } else {
            (None, Vec::new())
        };

        Ok(SetOutcome {
            new_value: next,
            triggers,
            change,
            subscribers,
        })
    }

    /// Attach a subscriber, keeping the list ordered by subscription id.
    /// Idempotent per subscription.
    pub(crate) fn attach(&self, id: SubscriptionId, handler: Arc<dyn ChangeHandler>) {
        let mut state = self.state.write();
        if let Err(pos) = state.subscribers.binary_search_by_key(&id, |(sid, _)| *sid) {
            state.subscribers.insert(pos, (id, handler));
        }
    }

    pub(crate) fn detach(&self, id: SubscriptionId) {
        let mut state = self.state.write();
        if let Ok(pos) = state.subscribers.binary_search_by_key(&id, |(sid, _)| *sid) {
            state.subscribers.remove(pos);
        }
    }

    pub(crate) fn clear_subscribers(&self) {
        self.state.write().subscribers.clear();
    }
}

/// Type-erased handle to a shared property record.
///
/// Cloning is cheap and every clone addresses the same record.
#[derive(Clone)]
pub struct PropertyHandle {
    cell: Arc<PropertyCell>,
}

impl PropertyHandle {
    pub(crate) fn new(cell: Arc<PropertyCell>) -> Self {
        Self { cell }
    }

    pub fn key(&self) -> &Key {
        &self.cell.key
    }

    pub fn id(&self) -> PropertyId {
        self.cell.id
    }

    pub fn kind(&self) -> ValueKind {
        self.cell.kind
    }

    /// The optional group tag (without the `$` addressing prefix).
    pub fn group(&self) -> Option<&str> {
        self.cell.group.as_deref()
    }

    pub fn format_spec(&self) -> Option<&FormatSpec> {
        self.cell.format.as_ref()
    }

    /// Current value (the registration seed if never set).
    pub fn value(&self) -> Value {
        self.cell.state.read().value.clone()
    }

    /// Whether the record has ever carried an explicit value (a
    /// registration default or a completed set).
    pub fn is_primed(&self) -> bool {
        self.cell.state.read().primed
    }

    /// Write a value through the full set path.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        let outcome = self.cell.write(value.into())?;

        for trigger in &outcome.triggers {
            trigger(&outcome.new_value);
        }
        if let Some(change) = &outcome.change {
            debug!(key = %self.key(), %change, "property changed");
            for handler in &outcome.subscribers {
                if handler.is_live() {
                    handler.on_change(self, change);
                }
            }
        }
        Ok(())
    }

    /// Current value rendered through the record's format spec, or its
    /// natural display form when no spec is set.
    pub fn formatted(&self) -> String {
        let value = self.value();
        match &self.cell.format {
            Some(spec) => spec.apply(&value),
            None => value.to_display_string(),
        }
    }

    /// Natural (unformatted) display form of the current value.
    pub fn to_display_string(&self) -> String {
        self.value().to_display_string()
    }

    /// Vector view of the current value; scalars splat.
    pub fn to_vec2(&self) -> Option<Vec2> {
        self.value().as_vec2()
    }

    /// Combine the current value with an operand and commit the result
    /// through the full set path. The operand's compatibility is checked
    /// at runtime.
    pub fn apply(&self, op: ArithOp, operand: impl Into<Value>) -> Result<Value> {
        let operand = operand.into();
        let next = self
            .value()
            .combine(op, &operand)
            .map_err(|e| self.op_error(e))?;
        self.set(next.clone())?;
        Ok(next)
    }

    pub fn add(&self, operand: impl Into<Value>) -> Result<Value> {
        self.apply(ArithOp::Add, operand)
    }

    pub fn subtract(&self, operand: impl Into<Value>) -> Result<Value> {
        self.apply(ArithOp::Subtract, operand)
    }

    pub fn multiply(&self, operand: impl Into<Value>) -> Result<Value> {
        self.apply(ArithOp::Multiply, operand)
    }

    pub fn divide(&self, operand: impl Into<Value>) -> Result<Value> {
        self.apply(ArithOp::Divide, operand)
    }

    /// Order the current value against an operand of a comparable kind.
    pub fn compare(&self, operand: impl Into<Value>) -> Result<CmpOrdering> {
        let operand = operand.into();
        self.value().compare(&operand).map_err(|e| self.op_error(e))
    }

    /// Negate a numeric or vector record in place.
    pub fn negate(&self) -> Result<Value> {
        let next = self.value().negated().map_err(|e| self.op_error(e))?;
        self.set(next.clone())?;
        Ok(next)
    }

    /// Toggle a boolean record in place.
    pub fn toggle(&self) -> Result<Value> {
        let next = self.value().toggled().map_err(|e| self.op_error(e))?;
        self.set(next.clone())?;
        Ok(next)
    }

    /// Write-lock the record; subsequent sets fail with
    /// [`PropertyError::Locked`] until unlocked.
    pub fn lock(&self) {
        self.cell.locked.store(true, Ordering::Release);
    }

    pub fn unlock(&self) {
        self.cell.locked.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.cell.locked.load(Ordering::Acquire)
    }

    /// Append a conditional rewrite applied to incoming values before
    /// commit. Hooks run in registration order, under the cell lock:
    /// a transform must not touch the pool or this record.
    pub fn add_transform<P, F>(&self, predicate: P, transform: F)
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let mut state = self.cell.state.write();
        state
            .transforms
            .push((Arc::new(predicate), Arc::new(transform)));
    }

    /// Append a conditional side effect run after commit, before the
    /// change event.
    pub fn add_trigger<P, F>(&self, predicate: P, action: F)
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut state = self.cell.state.write();
        state.triggers.push((Arc::new(predicate), Arc::new(action)));
    }

    pub fn subscriber_count(&self) -> usize {
        self.cell.state.read().subscribers.len()
    }

    pub(crate) fn attach(&self, id: SubscriptionId, handler: Arc<dyn ChangeHandler>) {
        self.cell.attach(id, handler);
    }

    pub(crate) fn detach(&self, id: SubscriptionId) {
        self.cell.detach(id);
    }

    pub(crate) fn clear_subscribers(&self) {
        self.cell.clear_subscribers();
    }

    fn op_error(&self, e: ValueOpError) -> PropertyError {
        match e {
            ValueOpError::KindMismatch { expected, got } => PropertyError::TypeMismatch {
                key: self.key().clone(),
                expected,
                got,
            },
            ValueOpError::NoRule { op, kind } => PropertyError::UnsupportedOperation {
                key: self.key().clone(),
                op,
                kind,
            },
            ValueOpError::DivisionByZero => PropertyError::DivisionByZero(self.key().clone()),
        }
    }
}

impl fmt::Display for PropertyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[key='{}' id={} {}({})",
            self.key(),
            self.id(),
            self.kind(),
            self.formatted()
        )?;
        if let Some(group) = self.group() {
            write!(f, " group='{}'", group)?;
        }
        write!(f, " handlers={}", self.subscriber_count())?;
        if self.is_locked() {
            write!(f, " locked")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for PropertyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyHandle")
            .field("key", self.key())
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Typed view over a shared record. The parameter is checked against the
/// record's kind when the view is created, so `get` cannot fail.
pub struct Property<T: PropertyValue> {
    handle: PropertyHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PropertyValue> Property<T> {
    pub(crate) fn from_handle(handle: PropertyHandle) -> Result<Self> {
        if handle.kind() != T::KIND {
            return Err(PropertyError::TypeMismatch {
                key: handle.key().clone(),
                expected: handle.kind(),
                got: T::KIND,
            });
        }
        Ok(Self {
            handle,
            _marker: PhantomData,
        })
    }

    pub fn get(&self) -> T {
        Self::typed(self.handle.value())
    }

    pub fn set(&self, value: T) -> Result<()> {
        self.handle.set(value.into_value())
    }

    /// Read-modify-write through the full set path.
    pub fn update(&self, f: impl FnOnce(T) -> T) -> Result<()> {
        self.set(f(self.get()))
    }

    pub fn add(&self, operand: T) -> Result<T> {
        self.handle
            .apply(ArithOp::Add, operand.into_value())
            .map(Self::typed)
    }

    pub fn subtract(&self, operand: T) -> Result<T> {
        self.handle
            .apply(ArithOp::Subtract, operand.into_value())
            .map(Self::typed)
    }

    pub fn multiply(&self, operand: T) -> Result<T> {
        self.handle
            .apply(ArithOp::Multiply, operand.into_value())
            .map(Self::typed)
    }

    pub fn divide(&self, operand: T) -> Result<T> {
        self.handle
            .apply(ArithOp::Divide, operand.into_value())
            .map(Self::typed)
    }

    pub fn compare(&self, operand: T) -> Result<CmpOrdering> {
        self.handle.compare(operand.into_value())
    }

    pub fn formatted(&self) -> String {
        self.handle.formatted()
    }

    pub fn key(&self) -> &Key {
        self.handle.key()
    }

    /// Typed conditional rewrite hook.
    pub fn add_transform<P, F>(&self, predicate: P, transform: F)
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.handle.add_transform(
            move |v: &Value| T::from_value_ref(v).is_some_and(|t| predicate(&t)),
            move |v: Value| match T::from_value_ref(&v) {
                Some(t) => transform(t).into_value(),
                None => v,
            },
        );
    }

    /// Typed conditional side-effect hook.
    pub fn add_trigger<P, F>(&self, predicate: P, action: F)
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.handle.add_trigger(
            move |v: &Value| T::from_value_ref(v).is_some_and(|t| predicate(&t)),
            move |v: &Value| {
                if let Some(t) = T::from_value_ref(v) {
                    action(&t);
                }
            },
        );
    }

    pub fn handle(&self) -> &PropertyHandle {
        &self.handle
    }

    pub fn into_handle(self) -> PropertyHandle {
        self.handle
    }

    /// Combinators on equal kinds preserve the kind, and the kind was
    /// asserted when this view was created.
    fn typed(value: Value) -> T {
        T::from_value(value).expect("record value drifted from its registered kind")
    }
}

impl<T: PropertyValue> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: PropertyValue> fmt::Display for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.handle.fmt(f)
    }
}

impl<T: PropertyValue> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.handle.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn test_handle(kind: ValueKind, default: Option<Value>) -> PropertyHandle {
        let cell = PropertyCell::new(
            PropertyId(1),
            Key::parse("test.record").unwrap(),
            kind,
            default,
            None,
            None,
            false,
        );
        PropertyHandle::new(Arc::new(cell))
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> Arc<dyn ChangeHandler> {
        Arc::new(move |_: &PropertyHandle, _: &ValueChange| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_set_and_get() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(1)));
        assert_eq!(handle.value(), Value::Int(1));
        handle.set(Value::Int(2)).unwrap();
        assert_eq!(handle.value(), Value::Int(2));
    }

    #[test]
    fn test_set_wrong_kind() {
        let handle = test_handle(ValueKind::Int, None);
        let err = handle.set(Value::Str("five".into())).unwrap_err();
        assert!(matches!(err, PropertyError::TypeMismatch { .. }));
    }

    #[test]
    fn test_change_fires_only_on_difference() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(0)));
        let fired = Arc::new(AtomicUsize::new(0));
        handle.attach(SubscriptionId(1), counting_handler(fired.clone()));

        handle.set(Value::Int(5)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        handle.set(Value::Int(5)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        handle.set(Value::Int(6)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_first_set_on_unseeded_record_fires_with_no_old() {
        let handle = test_handle(ValueKind::Int, None);
        let seen: Arc<Mutex<Vec<ValueChange>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        handle.attach(
            SubscriptionId(1),
            Arc::new(move |_: &PropertyHandle, change: &ValueChange| {
                sink.lock().unwrap().push(change.clone());
            }),
        );

        // Same value as the kind-zero seed: fires anyway, with old=None.
        handle.set(Value::Int(0)).unwrap();
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], ValueChange { old: None, new: Value::Int(0) });
    }

    #[test]
    fn test_seeded_default_is_prior_value() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(0)));
        let fired = Arc::new(AtomicUsize::new(0));
        handle.attach(SubscriptionId(1), counting_handler(fired.clone()));

        handle.set(Value::Int(0)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_transform_hooks_run_in_order() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(0)));
        handle.add_transform(
            |v| matches!(v, Value::Int(i) if *i < 0),
            |_| Value::Int(0),
        );
        handle.add_transform(
            |v| matches!(v, Value::Int(i) if *i > 99),
            |_| Value::Int(99),
        );

        handle.set(Value::Int(-5)).unwrap();
        assert_eq!(handle.value(), Value::Int(0));
        handle.set(Value::Int(250)).unwrap();
        assert_eq!(handle.value(), Value::Int(99));
        handle.set(Value::Int(42)).unwrap();
        assert_eq!(handle.value(), Value::Int(42));
    }

    #[test]
    fn test_trigger_runs_even_without_change() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(7)));
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = hits.clone();
        handle.add_trigger(
            |v| matches!(v, Value::Int(i) if *i == 7),
            move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
            },
        );

        handle.set(Value::Int(7)).unwrap();
        handle.set(Value::Int(7)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_locked_record_rejects_writes() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(1)));
        handle.lock();
        assert!(matches!(
            handle.set(Value::Int(2)),
            Err(PropertyError::Locked(_))
        ));
        handle.unlock();
        handle.set(Value::Int(2)).unwrap();
        assert_eq!(handle.value(), Value::Int(2));
    }

    #[test]
    fn test_arithmetic_goes_through_set_path() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(10)));
        let fired = Arc::new(AtomicUsize::new(0));
        handle.attach(SubscriptionId(1), counting_handler(fired.clone()));

        assert_eq!(handle.add(5i64).unwrap(), Value::Int(15));
        assert_eq!(handle.value(), Value::Int(15));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_divide_by_zero() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(10)));
        assert!(matches!(
            handle.divide(0i64),
            Err(PropertyError::DivisionByZero(_))
        ));
        assert_eq!(handle.value(), Value::Int(10));
    }

    #[test]
    fn test_unsupported_unary() {
        let handle = test_handle(ValueKind::Str, Some(Value::Str("x".into())));
        assert!(matches!(
            handle.negate(),
            Err(PropertyError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_typed_view() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(3)));
        let prop: Property<i64> = Property::from_handle(handle.clone()).unwrap();
        assert_eq!(prop.get(), 3);
        prop.set(4).unwrap();
        assert_eq!(prop.get(), 4);
        assert_eq!(prop.add(1).unwrap(), 5);
        prop.update(|v| v * 2).unwrap();
        assert_eq!(prop.get(), 10);

        assert!(Property::<bool>::from_handle(handle).is_err());
    }

    #[test]
    fn test_typed_transform_clamps() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(0)));
        let prop: Property<i64> = Property::from_handle(handle).unwrap();
        prop.add_transform(|v| *v > 100, |_| 100);
        prop.set(500).unwrap();
        assert_eq!(prop.get(), 100);
    }

    #[test]
    fn test_handler_may_reenter_record() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(0)));
        let inner = handle.clone();
        handle.attach(
            SubscriptionId(1),
            Arc::new(move |_: &PropertyHandle, change: &ValueChange| {
                // Reading during dispatch must not deadlock.
                assert_eq!(inner.value(), change.new);
            }),
        );
        handle.set(Value::Int(9)).unwrap();
    }

    #[test]
    fn test_attach_is_idempotent() {
        let handle = test_handle(ValueKind::Int, Some(Value::Int(0)));
        let fired = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(fired.clone());
        handle.attach(SubscriptionId(1), handler.clone());
        handle.attach(SubscriptionId(1), handler);
        assert_eq!(handle.subscriber_count(), 1);

        handle.set(Value::Int(1)).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_display_shows_formatted_value() {
        let cell = PropertyCell::new(
            PropertyId(9),
            Key::parse("main.level.time").unwrap(),
            ValueKind::Int,
            Some(Value::Int(7)),
            Some(FormatSpec::Decimal { width: 3 }),
            Some("main.hud".into()),
            false,
        );
        let handle = PropertyHandle::new(Arc::new(cell));
        let text = handle.to_string();
        assert!(text.contains("main.level.time"), "{}", text);
        assert!(text.contains("int(007)"), "{}", text);
        assert!(text.contains("group='main.hud'"), "{}", text);
    }
}
