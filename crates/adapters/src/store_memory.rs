//! In-memory local store for testing and ephemeral sessions

use async_trait::async_trait;
use connectum_domain::{LocalStore, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory local store implementation
pub struct InMemoryLocalStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryLocalStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn write_all(&self, collection: &str, records: &[Value]) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        collections.insert(collection.to_string(), records.to_vec());
        Ok(())
    }

    async fn append(&self, collection: &str, record: Value) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(record);
        Ok(())
    }
}
