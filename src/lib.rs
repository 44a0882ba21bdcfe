//! # propkit
//!
//! A reactive, type-safe property registry: process-wide keyed records
//! declared once, shared everywhere, observed through wildcard
//! subscriptions.
//!
//! ## Core Concepts
//!
//! - **Records**: named value cells of a fixed kind, with optional
//!   display format, group tag, transform/trigger hooks and a write-lock
//! - **Pool**: the keyed registry; create-or-share, typed fetch, clear
//! - **Patterns**: dot-segmented `*` wildcards over keys, `$`-prefixed
//!   over group tags, compiled once per subscription
//! - **Subscriptions**: callback handlers or bounded channel streams,
//!   reconciled in both directions so attachment order never matters
//! - **Slots**: declarative registration tables bound at startup
//!
//! ## Example
//!
//! ```ignore
//! use propkit::{PropertyPool, PropertyHandle, ValueChange};
//!
//! let pool = PropertyPool::new();
//!
//! // Declare shared state.
//! let score = pool.create_or_get("main.player.score", 0i64)?;
//!
//! // Observe it by pattern, from anywhere.
//! pool.subscribe("main.player.*", |p: &PropertyHandle, c: &ValueChange| {
//!     println!("{} {}", p.key(), c);
//! })?;
//!
//! // Writes fan out to matching subscribers.
//! score.add(100)?;
//! ```

pub mod bindings;
pub mod error;
pub mod format;
pub mod pattern;
pub mod persist;
pub mod pool;
pub mod record;
pub mod subscriptions;
pub mod types;
pub mod value;

// Re-exports
pub use glam;

pub use bindings::{BoundProperties, DeclareProperties, PropertySlot};
pub use error::{PropertyError, Result};
pub use format::FormatSpec;
pub use pattern::{Pattern, PatternTarget};
pub use persist::{Snapshot, SnapshotEncoding, SnapshotEntry};
pub use pool::{PropertyPool, PropertyRegistration};
pub use record::{Property, PropertyHandle};
pub use subscriptions::{
    ChangeHandler, PropertyStream, PropertyUpdate, SubscriptionId, SubscriptionManager,
    ValueChange,
};
pub use types::{Key, PropertyId};
pub use value::{ArithOp, PropertyValue, Value, ValueKind};
