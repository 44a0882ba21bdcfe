//! Subscription broker: pattern → handler bookkeeping and the
//! two-directional reconciliation between subscriptions and records.

use crate::pattern::Pattern;
use crate::record::PropertyHandle;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use super::types::{ChangeHandler, SubscriptionId};

/// One stored subscription: the rule is compiled exactly once, here.
struct Subscription {
    id: SubscriptionId,
    pattern: Pattern,
    handler: Arc<dyn ChangeHandler>,
}

/// Owns the subscription table. Attachment to individual records is done
/// through the record handles the pool passes in; the broker itself
/// never holds record state.
pub struct SubscriptionManager {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a compiled subscription and hand back its id. The caller
    /// (the pool) follows up with [`attach_existing`] to reconcile
    /// against records that already exist.
    ///
    /// [`attach_existing`]: SubscriptionManager::attach_existing
    pub(crate) fn add(&self, pattern: Pattern, handler: Arc<dyn ChangeHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        trace!(%id, pattern = %pattern, "subscription added");
        self.subscriptions.write().push(Subscription {
            id,
            pattern,
            handler,
        });
        id
    }

    /// Drop a subscription from the table. Returns its handler so the
    /// pool can detach it from every record; `None` for unknown ids.
    pub(crate) fn remove(&self, id: SubscriptionId) -> Option<Arc<dyn ChangeHandler>> {
        let mut subs = self.subscriptions.write();
        let pos = subs.iter().position(|s| s.id == id)?;
        let sub = subs.remove(pos);
        trace!(%id, pattern = %sub.pattern, "subscription removed");
        Some(sub.handler)
    }

    /// Reconcile "record created after subscription exists": attach every
    /// matching stored subscription to the new record.
    pub(crate) fn attach_matching(&self, record: &PropertyHandle) {
        let subs = self.subscriptions.read();
        for sub in subs.iter() {
            if sub.pattern.matches_record(record.key(), record.group()) {
                trace!(key = %record.key(), pattern = %sub.pattern, "subscriber attached");
                record.attach(sub.id, sub.handler.clone());
            }
        }
    }

    /// Reconcile "subscribe after record exists": attach one stored
    /// subscription to every matching record.
    pub(crate) fn attach_existing<I>(&self, id: SubscriptionId, records: I)
    where
        I: IntoIterator<Item = PropertyHandle>,
    {
        let subs = self.subscriptions.read();
        let Some(sub) = subs.iter().find(|s| s.id == id) else {
            return;
        };
        for record in records {
            if sub.pattern.matches_record(record.key(), record.group()) {
                trace!(key = %record.key(), pattern = %sub.pattern, "subscriber attached");
                record.attach(sub.id, sub.handler.clone());
            }
        }
    }

    pub fn count(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub(crate) fn clear(&self) {
        self.subscriptions.write().clear();
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
