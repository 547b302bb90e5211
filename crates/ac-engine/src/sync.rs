//! Configuration synchronizer
//!
//! Holds the page's view of the settings record and its effective state.
//! Both are rebuilt together from one store snapshot on every refresh.

use std::sync::Arc;
use std::time::Duration;

use ac_core::store::load_settings;
use ac_core::{EffectiveActivationState, Settings, SettingsKey, SettingsStore, StoreChange};
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub struct ConfigSynchronizer {
    store: Arc<dyn SettingsStore>,
    settings: Settings,
    state: EffectiveActivationState,
    loaded: bool,
}

impl ConfigSynchronizer {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            settings: Settings::default(),
            state: EffectiveActivationState::inactive(),
            loaded: false,
        }
    }

    /// Reload settings and recompute the state for `url`.
    ///
    /// When the store cannot be read the last loaded settings are kept (or
    /// the defaults, which are inactive, before the first successful load).
    pub async fn refresh(&mut self, url: &str) -> &EffectiveActivationState {
        match load_settings(self.store.as_ref()).await {
            Ok(settings) => {
                self.settings = settings;
                self.loaded = true;
            }
            Err(e) => {
                warn!(error = %e, loaded = self.loaded, "Settings refresh failed, keeping previous settings");
            }
        }
        self.state = EffectiveActivationState::compute(&self.settings, url);
        debug!(
            origin = %self.state.origin,
            active = self.state.active,
            dry_run = self.state.dry_run,
            "Activation state refreshed"
        );
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &EffectiveActivationState {
        &self.state
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.settings.debounce_ms)
    }

    /// True if `change` touched a key that can change this page's state.
    /// Activation history alone never does.
    pub fn is_relevant(&self, change: &StoreChange) -> bool {
        change.affects_settings(self.store.area())
            && change
                .keys
                .iter()
                .filter_map(|k| SettingsKey::parse(k))
                .any(|k| k != SettingsKey::LastActivationByOrigin)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_core::MemoryStore;
    use serde_json::json;

    const URL: &str = "https://example.com/form";

    fn snapshot(value: serde_json::Value) -> ac_core::StoreSnapshot {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_refresh_from_partial_store() {
        let store = Arc::new(MemoryStore::with_values(snapshot(json!({
            "global_enabled": true,
            "allowlist_patterns": ["https://example.com/*"]
        }))));
        let mut sync = ConfigSynchronizer::new(store);
        assert!(!sync.state().active);

        let state = sync.refresh(URL).await.clone();
        assert!(state.active);
        assert!(state.dry_run);
        assert_eq!(sync.debounce(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_refresh_sees_later_writes() {
        let store = Arc::new(MemoryStore::new());
        let mut sync = ConfigSynchronizer::new(store.clone());
        assert!(!sync.refresh(URL).await.active);

        store
            .set(snapshot(json!({
                "global_enabled": true,
                "allowlist_patterns": ["https://example.com/*"],
                "site_overrides": {"https://example.com": false}
            })))
            .await
            .unwrap();
        let state = sync.refresh(URL).await;
        assert!(state.allowlisted);
        assert!(!state.site_enabled);
        assert!(!state.active);
    }

    #[test]
    fn test_relevance_filter() {
        let sync = ConfigSynchronizer::new(Arc::new(MemoryStore::new()));
        let relevant = StoreChange {
            area: "local".to_string(),
            keys: vec!["dry_run".to_string()],
        };
        let other_key = StoreChange {
            area: "local".to_string(),
            keys: vec!["theme".to_string()],
        };
        let other_area = StoreChange {
            area: "sync".to_string(),
            keys: vec!["dry_run".to_string()],
        };
        let history_only = StoreChange {
            area: "local".to_string(),
            keys: vec!["last_activation_by_origin".to_string()],
        };
        assert!(sync.is_relevant(&relevant));
        assert!(!sync.is_relevant(&history_only));
        assert!(!sync.is_relevant(&other_key));
        assert!(!sync.is_relevant(&other_area));
    }
}
