//! Settings loading and live reload from the store's change feed

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use slopscan_core::{Settings, SETTINGS_KEY};
use slopscan_store::{KeyValueStore, StoreError};
use std::sync::{Arc, Weak};

use crate::AnalysisDispatcher;

/// Read the stored settings merged over the defaults
pub async fn load_settings(store: &dyn KeyValueStore) -> Result<Settings, StoreError> {
    let stored = store.get_one(SETTINGS_KEY).await?;
    Ok(Settings::merge(stored.as_ref()))
}

/// Persist `settings` under the settings key
pub async fn save_settings(store: &dyn KeyValueStore, settings: &Settings) -> Result<(), StoreError> {
    store
        .set([(SETTINGS_KEY.to_string(), settings.to_value())].into())
        .await
}

/// Re-apply settings to `dispatcher` whenever the stored copy changes.
///
/// The watcher holds the store weakly. It stops once the store is
/// dropped, which closes its change feed.
pub fn watch_settings(store: Arc<dyn KeyValueStore>, dispatcher: AnalysisDispatcher) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    let store: Weak<dyn KeyValueStore> = Arc::downgrade(&store);

    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) if change.touches(SETTINGS_KEY) => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Settings watcher lagged by {} changes, reloading", skipped);
                }
                Err(RecvError::Closed) => break,
            }

            let Some(live) = store.upgrade() else {
                break;
            };
            match load_settings(live.as_ref()).await {
                Ok(settings) => {
                    info!(
                        "Settings reloaded: enabled={}, ttl={}h",
                        settings.enabled, settings.cache_ttl_hours
                    );
                    dispatcher.apply_settings(settings);
                }
                Err(e) => warn!("Failed to reload settings: {}", e),
            }
        }
        debug!("Settings watcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DispatcherConfig;
    use async_trait::async_trait;
    use serde_json::json;
    use slopscan_core::ModelSelector;
    use slopscan_net::{FetchError, FetchedPage, HtmlFetcher};
    use slopscan_store::{JsonFileStore, MemoryStore};
    use std::collections::HashMap;
    use std::time::Duration;

    struct NoFetch;

    #[async_trait]
    impl HtmlFetcher for NoFetch {
        async fn fetch_markup(&self, _url: &str) -> Result<FetchedPage, FetchError> {
            Err(FetchError::Status(503))
        }
    }

    fn dispatcher(store: Arc<dyn KeyValueStore>, settings: Settings) -> AnalysisDispatcher {
        AnalysisDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(NoFetch),
            store,
            ModelSelector::default(),
            settings,
        )
    }

    #[tokio::test]
    async fn test_load_settings_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load_settings(&store).await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_load_settings_merges_stored() {
        let store = MemoryStore::new();
        store
            .set(HashMap::from([(
                SETTINGS_KEY.to_string(),
                json!({"enabled": false, "cacheTTLHours": "24"}),
            )]))
            .await
            .unwrap();

        let settings = load_settings(&store).await.unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.cache_ttl_hours, 24);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("store.json")).await.unwrap();
        let settings = Settings {
            enabled: false,
            cache_ttl_hours: 6,
        };

        save_settings(&store, &settings).await.unwrap();
        assert_eq!(load_settings(&store).await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_watcher_applies_changes() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let d = dispatcher(store.clone(), Settings::default());
        let handle = watch_settings(store.clone(), d.clone());

        // Unrelated keys are ignored
        store
            .set(HashMap::from([("other".to_string(), json!(1))]))
            .await
            .unwrap();

        save_settings(
            store.as_ref(),
            &Settings {
                enabled: false,
                cache_ttl_hours: 3,
            },
        )
        .await
        .unwrap();

        for _ in 0..50 {
            if !d.is_enabled() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!d.is_enabled());
        assert_eq!(d.cache().ttl_hours(), 3);
        handle.abort();
    }

    #[tokio::test]
    async fn test_watcher_stops_when_store_dropped() {
        let watched: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let d = dispatcher(Arc::new(MemoryStore::new()), Settings::default());
        let handle = watch_settings(watched.clone(), d);

        drop(watched);

        let finished = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(matches!(finished, Ok(Ok(()))));
    }
}
