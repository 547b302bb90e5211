//! In-memory settings store

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{SettingsStore, StoreChange, CHANGE_CHANNEL_CAPACITY, DEFAULT_AREA};
use crate::settings::StoreSnapshot;
use crate::Result;

/// Process-local store, used for tests and the `memory` backend
pub struct MemoryStore {
    area: String,
    values: RwLock<HashMap<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_area(DEFAULT_AREA)
    }

    pub fn with_area(area: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            area: area.into(),
            values: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Create a store pre-populated with `values`, without notifying anyone.
    pub fn with_values(values: StoreSnapshot) -> Self {
        let mut store = Self::new();
        store.values = RwLock::new(values.into_iter().collect());
        store
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    fn area(&self) -> &str {
        &self.area
    }

    async fn get(&self, keys: &[&str]) -> Result<StoreSnapshot> {
        let values = self.values.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn get_all(&self) -> Result<StoreSnapshot> {
        let values = self.values.read().await;
        Ok(values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    async fn set(&self, values: StoreSnapshot) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = values.keys().cloned().collect();
        {
            let mut stored = self.values.write().await;
            stored.extend(values);
        }
        debug!(area = %self.area, ?keys, "store updated");
        // No subscribers is fine.
        let _ = self.changes.send(StoreChange {
            area: self.area.clone(),
            keys,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Settings, SettingsKey};
    use crate::store::load_settings;
    use serde_json::json;

    fn snapshot(value: Value) -> StoreSnapshot {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_partial_get() {
        let store = MemoryStore::new();
        store.set(snapshot(json!({"dry_run": false}))).await.unwrap();

        let got = store.get(&["dry_run", "global_enabled"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["dry_run"], json!(false));
    }

    #[tokio::test]
    async fn test_set_notifies_written_keys() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store
            .set(snapshot(json!({"global_enabled": true})))
            .await
            .unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.area, "local");
        assert_eq!(change.keys, vec!["global_enabled".to_string()]);
        assert!(change.affects_settings("local"));
        assert!(!change.affects_settings("sync"));
    }

    #[test]
    fn test_with_values_is_silent() {
        let store = MemoryStore::with_values(snapshot(json!({"dry_run": false})));
        let mut rx = store.subscribe();
        let got = tokio_test::block_on(store.get(&["dry_run"])).unwrap();
        assert_eq!(got["dry_run"], json!(false));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_set_is_silent() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        store.set(StoreSnapshot::new()).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unrelated_keys_do_not_affect_settings() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        store.set(snapshot(json!({"theme": "dark"}))).await.unwrap();
        assert!(!rx.recv().await.unwrap().affects_settings("local"));
    }

    #[tokio::test]
    async fn test_load_settings_merges_defaults() {
        let store = MemoryStore::with_values(snapshot(json!({"global_enabled": true})));
        let settings = load_settings(&store).await.unwrap();
        assert!(settings.global_enabled);
        assert_eq!(settings.activation_labels, Settings::default().activation_labels);

        let all = store.get_all().await.unwrap();
        assert!(all.contains_key(SettingsKey::GlobalEnabled.as_str()));
    }
}
