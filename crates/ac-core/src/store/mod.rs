//! Settings persistence
//!
//! A key/value store scoped to one named area, with change notifications.
//! Reads may be partial; absent keys are simply missing from the snapshot.
//! Every write is a set of independent key-level writes: consumers must not
//! assume two keys change together.

mod memory;
mod sqlite;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::settings::{Settings, SettingsKey, StoreSnapshot};
use crate::Result;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Default storage area name.
pub const DEFAULT_AREA: &str = "local";

/// Capacity of the change notification channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Notification sent after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// Area the write happened in
    pub area: String,
    /// Keys that were written
    pub keys: Vec<String>,
}

impl StoreChange {
    /// True if this change touched any settings key in `area`.
    pub fn affects_settings(&self, area: &str) -> bool {
        self.area == area && SettingsKey::any_known(&self.keys)
    }
}

/// Persisted key/value store
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Name of the area this store serves
    fn area(&self) -> &str;

    /// Read the given keys. Missing keys are not an error.
    async fn get(&self, keys: &[&str]) -> Result<StoreSnapshot>;

    /// Read every key in the area.
    async fn get_all(&self) -> Result<StoreSnapshot>;

    /// Write the given values and notify subscribers.
    async fn set(&self, values: StoreSnapshot) -> Result<()>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Load the full settings record from one consistent read, merged with defaults.
pub async fn load_settings(store: &dyn SettingsStore) -> Result<Settings> {
    let keys = SettingsKey::ALL.map(|k| k.as_str());
    let snapshot = store.get(&keys).await?;
    Ok(Settings::from_snapshot(&snapshot))
}

/// Read only the given settings keys.
pub async fn read_keys(store: &dyn SettingsStore, keys: &[SettingsKey]) -> Result<StoreSnapshot> {
    let keys: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
    store.get(&keys).await
}
