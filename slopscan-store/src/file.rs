//! JSON file store
//!
//! The whole map lives in memory and is rewritten to disk after every
//! mutation (temp file, then rename). Writes are serialized so the file
//! always reflects the latest snapshot.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::store::pick;
use crate::{KeyValueStore, StoreChange, StoreError};

pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, Value>>,
    write_lock: tokio::sync::Mutex<()>,
    changes: broadcast::Sender<StoreChange>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => {
                let map: Map<String, Value> = serde_json::from_str(&content)?;
                map.into_iter().collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!("Opened store {} with {} entries", path.display(), data.len());

        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            path,
            data: Mutex::new(data),
            write_lock: tokio::sync::Mutex::new(()),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutate` and persist the resulting snapshot
    async fn write_with<F>(&self, keys: Vec<String>, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut HashMap<String, Value>),
    {
        let _guard = self.write_lock.lock().await;

        let snapshot: Map<String, Value> = {
            let mut data = self.data.lock();
            mutate(&mut *data);
            data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let json = serde_json::to_vec_pretty(&Value::Object(snapshot))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Persisted {} bytes to {}", json.len(), self.path.display());

        let _ = self.changes.send(StoreChange { keys });
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: Option<&[String]>) -> Result<HashMap<String, Value>, StoreError> {
        Ok(pick(&self.data.lock(), keys))
    }

    async fn set(&self, items: HashMap<String, Value>) -> Result<(), StoreError> {
        let keys = items.keys().cloned().collect();
        self.write_with(keys, move |data| data.extend(items)).await
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StoreError> {
        let owned = keys.to_vec();
        self.write_with(owned.clone(), move |data| {
            for key in &owned {
                data.remove(key);
            }
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store
                .set(HashMap::from([
                    ("cache:abc".to_string(), json!({ "score": 0.4 })),
                    ("settings".to_string(), json!({ "enabled": false })),
                ]))
                .await
                .unwrap();
            store.remove(&["cache:abc".to_string()]).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let all = reopened.get(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["settings"], json!({ "enabled": false }));
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested/none.json")).await.unwrap();
        assert!(store.get(None).await.unwrap().is_empty());

        store.set(HashMap::from([("k".to_string(), json!(1))])).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path).await,
            Err(StoreError::Serialization(_))
        ));
    }
}
