//! Automation settings record
//!
//! The single versionless record shared by every page context, the
//! coordinator and the control surface. It only ever lives in the store as
//! individual keys; consumers rebuild a full [`Settings`] from one snapshot
//! instead of patching cached fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::matcher::matches_allowlist;
use crate::origin::Origin;

pub const MIN_DEBOUNCE_MS: u64 = 50;
pub const MAX_DEBOUNCE_MS: u64 = 5_000;
pub const MAX_COOLDOWN_MS: u64 = 300_000;

/// Key/value view of the store, as returned by a partial read.
pub type StoreSnapshot = Map<String, Value>;

/// Keys of the settings record in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingsKey {
    GlobalEnabled,
    DryRun,
    AllowlistPatterns,
    ActivationLabels,
    ContainerSelector,
    CooldownMs,
    DebounceMs,
    SiteOverrides,
    LastActivationByOrigin,
}

impl SettingsKey {
    pub const ALL: [SettingsKey; 9] = [
        SettingsKey::GlobalEnabled,
        SettingsKey::DryRun,
        SettingsKey::AllowlistPatterns,
        SettingsKey::ActivationLabels,
        SettingsKey::ContainerSelector,
        SettingsKey::CooldownMs,
        SettingsKey::DebounceMs,
        SettingsKey::SiteOverrides,
        SettingsKey::LastActivationByOrigin,
    ];

    /// Keys the settings surface edits directly.
    pub const EDITABLE: [SettingsKey; 7] = [
        SettingsKey::GlobalEnabled,
        SettingsKey::DryRun,
        SettingsKey::AllowlistPatterns,
        SettingsKey::ActivationLabels,
        SettingsKey::ContainerSelector,
        SettingsKey::CooldownMs,
        SettingsKey::DebounceMs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GlobalEnabled => "global_enabled",
            Self::DryRun => "dry_run",
            Self::AllowlistPatterns => "allowlist_patterns",
            Self::ActivationLabels => "activation_labels",
            Self::ContainerSelector => "container_selector",
            Self::CooldownMs => "cooldown_ms",
            Self::DebounceMs => "debounce_ms",
            Self::SiteOverrides => "site_overrides",
            Self::LastActivationByOrigin => "last_activation_by_origin",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }

    /// True if any of `keys` names a settings key.
    pub fn any_known<S: AsRef<str>>(keys: &[S]) -> bool {
        keys.iter().any(|k| Self::parse(k.as_ref()).is_some())
    }
}

/// Most recent activation on one origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    /// ISO-8601 timestamp
    pub at: String,
    pub label: String,
    pub dry_run: bool,
}

/// Automation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Master kill switch
    pub global_enabled: bool,
    /// Detect and report, but never activate
    pub dry_run: bool,
    /// Glob-style URL patterns; nothing matches when empty
    pub allowlist_patterns: Vec<String>,
    /// Labels that qualify an element as a candidate
    pub activation_labels: Vec<String>,
    /// Scope an element must be inside (blank = anywhere)
    pub container_selector: String,
    /// Minimum time between two activations on one page
    pub cooldown_ms: u64,
    /// Quiet period after a mutation before scanning
    pub debounce_ms: u64,
    /// Per-origin switch; absent means enabled
    pub site_overrides: BTreeMap<String, bool>,
    pub last_activation_by_origin: BTreeMap<String, ActivationRecord>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_enabled: false,
            dry_run: true,
            allowlist_patterns: Vec::new(),
            activation_labels: ["Submit", "Continue", "Apply", "Yes"]
                .into_iter()
                .map(String::from)
                .collect(),
            container_selector: "form, [role='dialog'], .modal, main".to_string(),
            cooldown_ms: 5_000,
            debounce_ms: 250,
            site_overrides: BTreeMap::new(),
            last_activation_by_origin: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Build settings from a (possibly partial) store snapshot.
    ///
    /// Missing keys and values of the wrong shape fall back to the default
    /// for that key only; everything else is normalized.
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> Self {
        let defaults = Self::default();
        let get = |key: SettingsKey| snapshot.get(key.as_str());

        Self {
            global_enabled: get(SettingsKey::GlobalEnabled)
                .and_then(coerce_bool)
                .unwrap_or(defaults.global_enabled),
            dry_run: get(SettingsKey::DryRun)
                .and_then(coerce_bool)
                .unwrap_or(defaults.dry_run),
            allowlist_patterns: get(SettingsKey::AllowlistPatterns)
                .and_then(coerce_string_list)
                .unwrap_or(defaults.allowlist_patterns),
            activation_labels: get(SettingsKey::ActivationLabels)
                .and_then(coerce_string_list)
                .unwrap_or(defaults.activation_labels),
            container_selector: get(SettingsKey::ContainerSelector)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults.container_selector),
            cooldown_ms: get(SettingsKey::CooldownMs)
                .and_then(coerce_i64)
                .map(clamp_cooldown)
                .unwrap_or(defaults.cooldown_ms),
            debounce_ms: get(SettingsKey::DebounceMs)
                .and_then(coerce_i64)
                .map(clamp_debounce)
                .unwrap_or(defaults.debounce_ms),
            site_overrides: get(SettingsKey::SiteOverrides)
                .and_then(Value::as_object)
                .map(coerce_overrides)
                .unwrap_or_default(),
            last_activation_by_origin: get(SettingsKey::LastActivationByOrigin)
                .and_then(Value::as_object)
                .map(coerce_records)
                .unwrap_or_default(),
        }
    }

    /// Store value for one key.
    pub fn value_of(&self, key: SettingsKey) -> Value {
        let value = match key {
            SettingsKey::GlobalEnabled => serde_json::to_value(self.global_enabled),
            SettingsKey::DryRun => serde_json::to_value(self.dry_run),
            SettingsKey::AllowlistPatterns => serde_json::to_value(&self.allowlist_patterns),
            SettingsKey::ActivationLabels => serde_json::to_value(&self.activation_labels),
            SettingsKey::ContainerSelector => serde_json::to_value(&self.container_selector),
            SettingsKey::CooldownMs => serde_json::to_value(self.cooldown_ms),
            SettingsKey::DebounceMs => serde_json::to_value(self.debounce_ms),
            SettingsKey::SiteOverrides => serde_json::to_value(&self.site_overrides),
            SettingsKey::LastActivationByOrigin => {
                serde_json::to_value(&self.last_activation_by_origin)
            }
        };
        // Plain data, cannot fail to serialize.
        value.unwrap_or(Value::Null)
    }

    /// Snapshot holding the given keys.
    pub fn snapshot_of(&self, keys: &[SettingsKey]) -> StoreSnapshot {
        keys.iter()
            .map(|k| (k.as_str().to_string(), self.value_of(*k)))
            .collect()
    }

    /// Snapshot holding every key.
    pub fn to_snapshot(&self) -> StoreSnapshot {
        self.snapshot_of(&SettingsKey::ALL)
    }

    /// Per-site switch for `origin`. Pages without an origin are never enabled.
    pub fn site_enabled(&self, origin: Option<&Origin>) -> bool {
        match origin {
            Some(origin) => self.site_overrides.get(origin.as_str()) != Some(&false),
            None => false,
        }
    }

    pub fn is_allowlisted(&self, url: &str) -> bool {
        matches_allowlist(url, &self.allowlist_patterns)
    }

    pub fn last_activation(&self, origin: &Origin) -> Option<&ActivationRecord> {
        self.last_activation_by_origin.get(origin.as_str())
    }
}

/// Values the settings surface submits on save, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableSettings {
    pub global_enabled: bool,
    pub dry_run: bool,
    #[serde(default)]
    pub allowlist_patterns: Vec<String>,
    #[serde(default)]
    pub activation_labels: Vec<String>,
    #[serde(default)]
    pub container_selector: String,
    pub cooldown_ms: i64,
    pub debounce_ms: i64,
}

impl EditableSettings {
    /// Normalize (trim, drop blanks, clamp) and render as store values.
    pub fn into_snapshot(self) -> StoreSnapshot {
        let settings = Settings {
            global_enabled: self.global_enabled,
            dry_run: self.dry_run,
            allowlist_patterns: clean_list(self.allowlist_patterns),
            activation_labels: clean_list(self.activation_labels),
            container_selector: self.container_selector.trim().to_string(),
            cooldown_ms: clamp_cooldown(self.cooldown_ms),
            debounce_ms: clamp_debounce(self.debounce_ms),
            ..Settings::default()
        };
        settings.snapshot_of(&SettingsKey::EDITABLE)
    }
}

impl From<&Settings> for EditableSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            global_enabled: settings.global_enabled,
            dry_run: settings.dry_run,
            allowlist_patterns: settings.allowlist_patterns.clone(),
            activation_labels: settings.activation_labels.clone(),
            container_selector: settings.container_selector.clone(),
            cooldown_ms: settings.cooldown_ms as i64,
            debounce_ms: settings.debounce_ms as i64,
        }
    }
}

pub fn clamp_debounce(ms: i64) -> u64 {
    ms.clamp(MIN_DEBOUNCE_MS as i64, MAX_DEBOUNCE_MS as i64) as u64
}

pub fn clamp_cooldown(ms: i64) -> u64 {
    ms.clamp(0, MAX_COOLDOWN_MS as i64) as u64
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    let list = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();
    Some(clean_list(list))
}

fn coerce_overrides(map: &Map<String, Value>) -> BTreeMap<String, bool> {
    map.iter()
        .filter_map(|(key, value)| {
            let origin = Origin::of(key)?;
            Some((origin.to_string(), coerce_bool(value)?))
        })
        .collect()
}

fn coerce_records(map: &Map<String, Value>) -> BTreeMap<String, ActivationRecord> {
    map.iter()
        .filter_map(|(key, value)| {
            let origin = Origin::of(key)?;
            let record = serde_json::from_value(value.clone()).ok()?;
            Some((origin.to_string(), record))
        })
        .collect()
}
