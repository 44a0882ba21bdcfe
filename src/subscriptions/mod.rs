//! Subscription system for live property updates.
//!
//! Consumers observe records through wildcard patterns rather than by
//! holding handles: a subscription's compiled pattern is reconciled in
//! both directions (eagerly against records that already exist, and
//! from the pool's registration path against records created later), so
//! attachment order never matters. Dispatch itself is synchronous and
//! happens on the changed record, in subscription-registration order.
//!
//! Two subscriber shapes are supported:
//! - callback handlers ([`ChangeHandler`], also implemented for plain
//!   closures), invoked inline during the write;
//! - bounded channel streams ([`PropertyStream`]) for consumers that
//!   poll once per frame.
//!
//! Subscriptions are never released automatically when their consumer
//! goes away; call `unsubscribe` or accept the leak (streams retire
//! themselves once their receiver is dropped).

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{ChangeHandler, PropertyStream, PropertyUpdate, SubscriptionId, ValueChange};

pub(crate) use types::StreamHandler;
