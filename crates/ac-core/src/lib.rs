//! ac-core: Submit Autoclicker Core Library
//!
//! Shared vocabulary for every context of the autoclicker: the automation
//! settings record and its store, allow-list and label matching, origin
//! normalization, the effective activation state projection, and the
//! control-surface message protocol.

pub mod config;
pub mod error;
pub mod matcher;
pub mod origin;
pub mod protocol;
pub mod settings;
pub mod status;
pub mod store;

pub use config::{EngineConfig, HostConfig, LogConfig, StoreBackend, StoreConfig};
pub use error::{Error, Result};
pub use matcher::{matches_allowlist, matches_label, normalize_text};
pub use origin::Origin;
pub use protocol::{MessageChannel, Request, RequestError, Response};
pub use settings::{ActivationRecord, EditableSettings, Settings, SettingsKey, StoreSnapshot};
pub use status::{EffectiveActivationState, Indicator};
pub use store::{MemoryStore, SettingsStore, SqliteStore, StoreChange};
