//! Storage traits and error types
//!
//! This module defines the trait interface for the key-value persistence store
//! and associated error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error for key '{key}': {message}")]
    Serialization { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for key-value persistence backends
///
/// The store outlives the in-memory state of any single engine instance. Access is
/// last-writer-wins; implementations need not provide transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> StoreResult<()>;
}
