//! Error types for orderline operations

use std::fmt;
use thiserror::Error;

/// The part of an order record a storage operation was touching when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubEntity {
    Order,
    Delivery,
    Payment,
    Items,
    /// Transaction begin/commit.
    Transaction,
    /// Acquiring a pooled connection.
    Connection,
}

impl fmt::Display for SubEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubEntity::Order => "orders",
            SubEntity::Delivery => "deliveries",
            SubEntity::Payment => "payments",
            SubEntity::Items => "items",
            SubEntity::Transaction => "transaction",
            SubEntity::Connection => "connection",
        };
        f.write_str(name)
    }
}

/// A message body that could not be decoded as an order record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed order payload: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// A well-formed order record that fails the semantic checks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: &'static str },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Order not found: {order_uid}")]
    NotFound { order_uid: String },

    #[error("Persistence failed on {entity}: {reason}")]
    Persistence { entity: SubEntity, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn not_found(order_uid: impl Into<String>) -> Self {
        StorageError::NotFound {
            order_uid: order_uid.into(),
        }
    }

    pub fn persistence(entity: SubEntity, reason: impl fmt::Display) -> Self {
        StorageError::Persistence {
            entity,
            reason: reason.to_string(),
        }
    }

    /// True for the "no such order" outcome, as opposed to a broken store or a corrupt order.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
