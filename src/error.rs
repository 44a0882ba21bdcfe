//! Error types for the property registry.

use crate::types::Key;
use crate::value::ValueKind;
use thiserror::Error;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("unknown property key: {0}")]
    UnknownKey(Key),

    #[error("type mismatch on '{key}': expected {expected}, got {got}")]
    TypeMismatch {
        key: Key,
        expected: ValueKind,
        got: ValueKind,
    },

    #[error("kind conflict on '{key}': registered as {existing}, requested {requested}")]
    KindConflict {
        key: Key,
        existing: ValueKind,
        requested: ValueKind,
    },

    #[error("unsupported operation '{op}' on {kind} property '{key}'")]
    UnsupportedOperation {
        key: Key,
        op: &'static str,
        kind: ValueKind,
    },

    #[error("division by zero on property '{0}'")]
    DivisionByZero(Key),

    #[error("property '{0}' is write-locked")]
    Locked(Key),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid subscription pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid format spec: {0}")]
    InvalidFormat(String),

    #[error("registration failed for {owner}, slot '{slot}': {reason}")]
    Registration {
        owner: String,
        slot: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for PropertyError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_eof() {
            PropertyError::Deserialization(e.to_string())
        } else {
            PropertyError::Serialization(e.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for PropertyError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        PropertyError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for PropertyError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        PropertyError::Deserialization(e.to_string())
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, PropertyError>;
