//! Error types for the storage engine.

use thiserror::Error;
use crate::types::PageId;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Page number beyond the allocated page count
    #[error("Page {page_id} out of range (page count: {page_count})")]
    OutOfRange { page_id: PageId, page_count: u32 },

    /// Page does not have enough room for a record and its slot
    #[error("Page {page_id} has insufficient space, need {needed} bytes but only {available} available")]
    InsufficientSpace {
        page_id: PageId,
        needed: usize,
        available: usize,
    },

    /// Leaf-only accessor used on an internal node or the other way round
    #[error("Invalid node operation: {0}")]
    InvalidNodeOperation(String),

    /// Slot index out of range or tombstoned
    #[error("Record not found at page {page_id}, slot {slot}")]
    RecordNotFound { page_id: PageId, slot: u32 },

    /// No catalog entry for the requested table
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    /// A table with this name (hash) already exists
    #[error("Table '{0}' already exists")]
    TableExists(String),

    /// Key is already present in the tree
    #[error("Duplicate key {0}")]
    DuplicateKey(i32),

    /// Encoded record cannot fit on an empty data page
    #[error("Record too large: {size} bytes (max: {max})")]
    RecordTooLarge { size: usize, max: usize },

    /// Table name is empty or longer than the catalog field
    #[error("Invalid table name: {0}")]
    InvalidName(String),

    /// Row does not match the table schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// Schema (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Data corruption detected (e.g., checksum mismatch)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Invalid page format or type
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Database file is corrupted or has invalid format
    #[error("Invalid database file: {0}")]
    InvalidDatabaseFile(String),

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an invalid page error
    pub fn invalid_page(msg: impl Into<String>) -> Self {
        Self::InvalidPage(msg.into())
    }

    /// Create an invalid node operation error
    pub fn invalid_node(msg: impl Into<String>) -> Self {
        Self::InvalidNodeOperation(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create an invalid database file error
    pub fn invalid_db(msg: impl Into<String>) -> Self {
        Self::InvalidDatabaseFile(msg.into())
    }
}
