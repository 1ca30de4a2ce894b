//! In-process primary store for credential-free runs and tests.

use std::collections::HashMap;

use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::RecordStore;

/// DashMap-backed [`RecordStore`]: collections of keyed documents plus
/// integer counter nodes. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, HashMap<String, Value>>,
    counters: DashMap<String, i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn get_all(&self, collection: &str) -> Result<HashMap<String, Value>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|entry| entry.get(id).cloned()))
    }

    async fn put(&self, collection: &str, id: &str, value: &Value) -> Result<(), StoreError> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value.clone());
        Ok(())
    }

    async fn patch(&self, collection: &str, id: &str, value: &Value) -> Result<(), StoreError> {
        let mut entry = self.collections.entry(collection.to_string()).or_default();
        let record = entry.entry(id.to_string()).or_insert(Value::Null);
        match (record.as_object_mut(), value.as_object()) {
            (Some(target), Some(fields)) => {
                for (k, v) in fields {
                    target.insert(k.clone(), v.clone());
                }
            }
            _ => *record = value.clone(),
        }
        Ok(())
    }

    async fn push(&self, collection: &str, value: &Value) -> Result<String, StoreError> {
        let key = Uuid::new_v4().to_string();
        self.put(collection, &key, value).await?;
        Ok(key)
    }

    async fn increment_counter(&self, path: &str) -> Result<i64, StoreError> {
        let mut counter = self.counters.entry(path.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
