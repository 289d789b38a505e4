//! Storage module for persisting harvest progress
//!
//! This module handles the key-value persistence used to carry a run across
//! navigation boundaries, including:
//! - The `KeyValueStore` trait and its error type
//! - A durable SQLite backend and an in-process memory backend
//! - Typed JSON helpers and the well-known keys used by the engine

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, StoreError, StoreResult};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Key holding the run checkpoint
pub const RUN_STATE_KEY: &str = "harvest.run_state";

/// Key holding the accumulated result set
pub const RESULTS_KEY: &str = "harvest.results";

/// Opens the durable store at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully opened store
/// * `Err(StoreError)` - Failed to open the database
pub fn open_store(path: &Path) -> StoreResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Reads and decodes the JSON value stored under `key`
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Encodes `value` as JSON and stores it under `key`
pub async fn save_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value).map_err(|e| StoreError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, &raw).await
}
