//! Host key-value store interface
//!
//! Keys are plain strings and values are JSON documents. Each call is a
//! single atomic read or write; nothing spans multiple calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the change notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Keys written or removed by one store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub keys: Vec<String>,
}

impl StoreChange {
    pub fn touches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Host-provided key-value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the given keys, or every entry when `keys` is `None`.
    /// Missing keys are simply absent from the result.
    async fn get(&self, keys: Option<&[String]>) -> Result<HashMap<String, Value>, StoreError>;

    /// Upsert every entry of `items`
    async fn set(&self, items: HashMap<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Feed of changed keys
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;

    /// Read a single key
    async fn get_one(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let keys = [key.to_string()];
        let mut found = self.get(Some(&keys)).await?;
        Ok(found.remove(key))
    }
}

/// Select `keys` (or everything) out of a map snapshot
pub(crate) fn pick(data: &HashMap<String, Value>, keys: Option<&[String]>) -> HashMap<String, Value> {
    match keys {
        None => data.clone(),
        Some(keys) => keys
            .iter()
            .filter_map(|k| data.get(k).map(|v| (k.clone(), v.clone())))
            .collect(),
    }
}

/// In-memory store
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            data: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: Option<&[String]>) -> Result<HashMap<String, Value>, StoreError> {
        Ok(pick(&self.data.lock(), keys))
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<(), StoreError> {
        let keys: Vec<String> = items.keys().cloned().collect();
        self.data.lock().extend(items);
        // No subscribers is fine
        let _ = self.changes.send(StoreChange { keys });
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StoreError> {
        {
            let mut data = self.data.lock();
            for key in keys {
                data.remove(key);
            }
        }
        let _ = self.changes.send(StoreChange {
            keys: keys.to_vec(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
