//! Coordinator / status aggregator
//!
//! The single process-wide authority over the settings record. It answers
//! status queries, applies control-surface commands, keeps the last
//! activation per origin and drives the badge of the focused page.
//!
//! Every entry point first waits for the one-time default seeding, so no
//! command ever observes a store without its default keys.

use std::collections::BTreeMap;
use std::sync::Arc;

use ac_core::store::{load_settings, read_keys};
use ac_core::{
    ActivationRecord, EditableSettings, EffectiveActivationState, Indicator, Origin, Request, Response,
    Settings, SettingsKey, SettingsStore, StoreSnapshot,
};
use chrono::{SecondsFormat, Utc};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::surface;

/// Label recorded when a report does not carry one.
pub const DEFAULT_ACTIVATION_LABEL: &str = "Submit";

/// Receives badge updates for the focused page.
pub trait IndicatorSink: Send + Sync {
    fn render(&self, url: &str, indicator: Indicator);
}

pub struct Coordinator {
    store: Arc<dyn SettingsStore>,
    seeded: OnceCell<()>,
    /// URL of the page currently in front of the user
    focused: RwLock<Option<String>>,
    indicator: Option<Arc<dyn IndicatorSink>>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            seeded: OnceCell::new(),
            focused: RwLock::new(None),
            indicator: None,
        }
    }

    pub fn with_indicator(mut self, sink: Arc<dyn IndicatorSink>) -> Self {
        self.indicator = Some(sink);
        self
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Write every default key that is absent from the store, once.
    ///
    /// Concurrent callers wait for the same attempt. A failed attempt leaves
    /// the cell empty and the next caller tries again.
    pub async fn ensure_defaults(&self) -> Result<()> {
        self.seeded
            .get_or_try_init(|| seed_defaults(self.store.as_ref()))
            .await?;
        Ok(())
    }

    pub async fn settings(&self) -> Result<Settings> {
        self.ensure_defaults().await?;
        Ok(load_settings(self.store.as_ref()).await?)
    }

    /// Effective state for `url`. No side effects.
    pub async fn get_status(&self, url: &str) -> Result<EffectiveActivationState> {
        let settings = self.settings().await?;
        Ok(EffectiveActivationState::compute(&settings, url))
    }

    /// Flip the master switch; returns the new value.
    pub async fn toggle_global(&self) -> Result<bool> {
        self.ensure_defaults().await?;
        let current = self.read(&[SettingsKey::GlobalEnabled]).await?;
        let next = !current.global_enabled;
        self.write(SettingsKey::GlobalEnabled, next).await?;
        info!(global_enabled = next, "Master switch toggled");
        self.refresh_indicator().await;
        Ok(next)
    }

    pub async fn set_global_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_defaults().await?;
        self.write(SettingsKey::GlobalEnabled, enabled).await?;
        info!(global_enabled = enabled, "Master switch set");
        self.refresh_indicator().await;
        Ok(())
    }

    pub async fn set_dry_run(&self, enabled: bool) -> Result<()> {
        self.ensure_defaults().await?;
        self.write(SettingsKey::DryRun, enabled).await?;
        info!(dry_run = enabled, "Dry-run set");
        self.refresh_indicator().await;
        Ok(())
    }

    /// Set the per-site switch for the origin of `url`.
    ///
    /// Returns the overrides as written.
    pub async fn set_site_enabled(&self, url: &str, enabled: bool) -> Result<BTreeMap<String, bool>> {
        let origin = Origin::parse(url)?;
        self.ensure_defaults().await?;

        let mut overrides = self.read(&[SettingsKey::SiteOverrides]).await?.site_overrides;
        overrides.insert(origin.to_string(), enabled);
        self.write(SettingsKey::SiteOverrides, &overrides).await?;
        info!(origin = %origin, enabled, "Site switch set");

        self.refresh_indicator().await;
        Ok(overrides)
    }

    /// Record an activation for the origin of `url`; the newest report wins.
    pub async fn report_activation(
        &self,
        url: &str,
        label: Option<&str>,
        at: Option<&str>,
        dry_run: bool,
    ) -> Result<ActivationRecord> {
        let origin = Origin::parse(url)?;
        self.ensure_defaults().await?;

        let record = ActivationRecord {
            at: at
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            label: label
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_ACTIVATION_LABEL)
                .to_string(),
            dry_run,
        };

        let mut history = self
            .read(&[SettingsKey::LastActivationByOrigin])
            .await?
            .last_activation_by_origin;
        history.insert(origin.to_string(), record.clone());
        self.write(SettingsKey::LastActivationByOrigin, &history).await?;
        debug!(origin = %origin, label = %record.label, dry_run, "Activation recorded");

        Ok(record)
    }

    /// Persist the settings surface's editable keys (normalized).
    pub async fn save_settings(&self, settings: EditableSettings) -> Result<()> {
        self.ensure_defaults().await?;
        self.store.set(settings.into_snapshot()).await?;
        info!("Settings saved");
        self.refresh_indicator().await;
        Ok(())
    }

    /// Overwrite every key with its default, clearing per-site data.
    pub async fn reset_defaults(&self) -> Result<()> {
        self.ensure_defaults().await?;
        self.store.set(Settings::default().to_snapshot()).await?;
        info!("Settings reset to defaults");
        self.refresh_indicator().await;
        Ok(())
    }

    /// Make `url` the focused page and render its badge.
    pub async fn focus_page(&self, url: &str) -> Result<Indicator> {
        *self.focused.write().await = Some(url.to_string());
        let indicator = self.get_status(url).await?.indicator();
        self.render(url, indicator);
        Ok(indicator)
    }

    pub async fn focused_page(&self) -> Option<String> {
        self.focused.read().await.clone()
    }

    /// Re-render the focused page's badge. Failures are logged only.
    pub async fn refresh_indicator(&self) -> Option<Indicator> {
        let url = self.focused_page().await?;
        match self.get_status(&url).await {
            Ok(status) => {
                let indicator = status.indicator();
                self.render(&url, indicator);
                Some(indicator)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Badge refresh failed");
                None
            }
        }
    }

    /// Answer one control-surface request. Never fails; errors become
    /// `{ok: false, error}`.
    pub async fn handle(&self, request: Request) -> Response {
        let kind = request.kind();
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(request = kind, error = %e, "Request failed");
                Response::failure(e.code())
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        let response = match request {
            Request::GetTabStatus { url } => {
                let settings = self.settings().await?;
                let last = Origin::of(&url).and_then(|origin| settings.last_activation(&origin).cloned());
                Response::success()
                    .with("status", EffectiveActivationState::compute(&settings, &url))
                    .with("last_activation", last)
            }
            Request::ToggleGlobal => {
                Response::success().with("global_enabled", self.toggle_global().await?)
            }
            Request::SetGlobalEnabled { enabled } => {
                self.set_global_enabled(enabled).await?;
                Response::success().with("global_enabled", enabled)
            }
            Request::SetDryRun { enabled } => {
                self.set_dry_run(enabled).await?;
                Response::success().with("dry_run", enabled)
            }
            Request::SetSiteEnabled { origin, enabled } => {
                let overrides = self.set_site_enabled(&origin, enabled).await?;
                Response::success().with("site_overrides", overrides)
            }
            Request::ReportClick {
                origin,
                label,
                at,
                dry_run,
            } => {
                self.report_activation(&origin, label.as_deref(), at.as_deref(), dry_run)
                    .await?;
                Response::success()
            }
            Request::TabActivated { url } => {
                let indicator = self.focus_page(&url).await?;
                Response::success()
                    .with("indicator", indicator)
                    .with("badge_text", indicator.text())
                    .with("badge_color", indicator.color())
            }
            Request::SaveSettings { settings } => match self.save_settings(settings).await {
                Ok(()) => Response::success().with("message", surface::saved_text()),
                Err(e) => Response::failure(e.code()).with("message", surface::save_failed_text(&e)),
            },
            Request::ResetDefaults => match self.reset_defaults().await {
                Ok(()) => Response::success().with("message", surface::DEFAULTS_RESTORED),
                Err(e) => Response::failure(e.code()).with("message", surface::reset_failed_text(&e)),
            },
        };
        Ok(response)
    }

    async fn read(&self, keys: &[SettingsKey]) -> Result<Settings> {
        let snapshot = read_keys(self.store.as_ref(), keys).await?;
        Ok(Settings::from_snapshot(&snapshot))
    }

    async fn write(&self, key: SettingsKey, value: impl serde::Serialize) -> Result<()> {
        let mut values = StoreSnapshot::new();
        values.insert(
            key.as_str().to_string(),
            serde_json::to_value(value).map_err(ac_core::Error::from)?,
        );
        self.store.set(values).await?;
        Ok(())
    }

    fn render(&self, url: &str, indicator: Indicator) {
        if let Some(sink) = &self.indicator {
            sink.render(url, indicator);
        }
    }
}

async fn seed_defaults(store: &dyn SettingsStore) -> ac_core::Result<()> {
    let keys = SettingsKey::ALL.map(|k| k.as_str());
    let existing = store.get(&keys).await?;
    let missing: StoreSnapshot = Settings::default()
        .to_snapshot()
        .into_iter()
        .filter(|(key, _)| !existing.contains_key(key))
        .collect();

    if missing.is_empty() {
        debug!("Settings already seeded");
        return Ok(());
    }
    info!(keys = ?missing.keys().collect::<Vec<_>>(), "Seeding default settings");
    store.set(missing).await
}
