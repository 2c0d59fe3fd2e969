//! Error types for offstore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::value::{AttributeId, ObjectId};

/// Result type alias using OffError
pub type Result<T> = std::result::Result<T, OffError>;

/// Unified error type for offstore operations
#[derive(Debug, Error)]
pub enum OffError {
    // -------------------------------------------------------------------------
    // Store Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Store is closed")]
    StoreClosed,

    #[error("Invalid store URI: {0}")]
    InvalidUri(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Object {id} has no value in attribute {attribute}")]
    KeyNotFound { attribute: AttributeId, id: ObjectId },

    #[error("Attribute {0} is not registered")]
    UnknownAttribute(AttributeId),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Backing File Errors
    // -------------------------------------------------------------------------
    #[error("Store corruption detected: {0}")]
    Corruption(String),

    #[error("Record of {size} bytes exceeds the {max} byte limit")]
    RecordTooLarge { size: u64, max: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for OffError {
    fn from(err: bincode::Error) -> Self {
        OffError::Serialization(err.to_string())
    }
}

impl OffError {
    /// True for the "absent id" lookup failure
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, OffError::KeyNotFound { .. })
    }
}
