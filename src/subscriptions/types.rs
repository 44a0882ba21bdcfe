//! Subscription types for live property updates.

use crate::record::PropertyHandle;
use crate::types::Key;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Before/after data passed to subscribers on a value change.
///
/// `old` is `None` only when the record had never been explicitly set:
/// "unset" has no prior value, so the very first set always fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub old: Option<Value>,
    pub new: Value,
}

impl fmt::Display for ValueChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old {
            Some(old) => write!(f, "({} => {})", old, self.new),
            None => write!(f, "(<unset> => {})", self.new),
        }
    }
}

/// A change event as delivered through a [`PropertyStream`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub key: Key,
    pub change: ValueChange,
}

/// Callback interface for subscribers.
///
/// Handlers are invoked synchronously, outside the changed record's
/// lock, so they may read or write other properties (including the one
/// that fired). Also implemented for plain closures.
pub trait ChangeHandler: Send + Sync {
    /// Called once per matching value change, in
    /// subscription-registration order.
    fn on_change(&self, property: &PropertyHandle, change: &ValueChange);

    /// A handler that reports `false` is skipped during dispatch; used
    /// by streams whose receiver went away.
    fn is_live(&self) -> bool {
        true
    }
}

impl<F> ChangeHandler for F
where
    F: Fn(&PropertyHandle, &ValueChange) + Send + Sync,
{
    fn on_change(&self, property: &PropertyHandle, change: &ValueChange) {
        self(property, change)
    }
}

/// Receiving end of a channel-backed subscription.
///
/// Updates are pushed with `try_send`; a stream whose buffer overflows
/// or whose receiver is dropped is retired and stops receiving (the
/// slow-consumer rule), observable via [`PropertyStream::is_live`].
pub struct PropertyStream {
    pub id: SubscriptionId,
    receiver: crossbeam_channel::Receiver<PropertyUpdate>,
    live: Arc<AtomicBool>,
}

impl PropertyStream {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: crossbeam_channel::Receiver<PropertyUpdate>,
        live: Arc<AtomicBool>,
    ) -> Self {
        Self { id, receiver, live }
    }

    /// Receive the next update (blocking).
    pub fn recv(&self) -> Result<PropertyUpdate, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an update (non-blocking).
    pub fn try_recv(&self) -> Result<PropertyUpdate, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<PropertyUpdate, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<PropertyUpdate> {
        self.receiver.try_iter().collect()
    }

    /// False once the stream has been retired for overflow or
    /// disconnection.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// The sending half backing a [`PropertyStream`], attached to records as
/// an ordinary [`ChangeHandler`].
pub(crate) struct StreamHandler {
    sender: crossbeam_channel::Sender<PropertyUpdate>,
    live: Arc<AtomicBool>,
}

impl StreamHandler {
    pub(crate) fn new(
        sender: crossbeam_channel::Sender<PropertyUpdate>,
        live: Arc<AtomicBool>,
    ) -> Self {
        Self { sender, live }
    }
}

impl ChangeHandler for StreamHandler {
    fn on_change(&self, property: &PropertyHandle, change: &ValueChange) {
        let update = PropertyUpdate {
            key: property.key().clone(),
            change: change.clone(),
        };
        if self.sender.try_send(update).is_err() {
            self.live.store(false, Ordering::Release);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}
