//! Control-surface text
//!
//! What the status popup and the settings page show the user. Failures are
//! always rendered as text here and never reach the automated page.

use ac_core::{ActivationRecord, EffectiveActivationState, Origin, Response};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::CoordinatorError;

pub const STATUS_UNAVAILABLE: &str = "Unable to read extension status.";
pub const DEFAULTS_RESTORED: &str = "Defaults restored.";

/// Popup status line for a page.
pub fn status_text(state: &EffectiveActivationState) -> &'static str {
    if state.active {
        if state.dry_run {
            "Active on this page (dry-run)."
        } else {
            "Active on this page (live)."
        }
    } else if state.global_enabled && !state.allowlisted {
        "Not active: URL is not in allowlist."
    } else if !state.site_enabled {
        "Not active: disabled for this site."
    } else {
        "Automation is paused."
    }
}

pub fn site_text(origin: Option<&Origin>) -> String {
    match origin {
        Some(origin) => format!("Site: {}", origin),
        None => "Site: unsupported page".to_string(),
    }
}

pub fn last_action_text(record: Option<&ActivationRecord>) -> String {
    match record.filter(|r| !r.at.is_empty()) {
        Some(record) => {
            let stamp = DateTime::parse_from_rfc3339(&record.at)
                .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|_| record.at.clone());
            let mode = if record.dry_run { "dry-run" } else { "live" };
            format!("Last action: {} ({})", stamp, mode)
        }
        None => "Last action: none".to_string(),
    }
}

pub fn saved_text() -> String {
    format!("Saved at {}", Local::now().format("%H:%M:%S"))
}

pub fn save_failed_text(error: &CoordinatorError) -> String {
    format!("Save failed: {}", error)
}

pub fn reset_failed_text(error: &CoordinatorError) -> String {
    format!("Reset failed: {}", error)
}

/// Everything the status popup renders for one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupView {
    pub status: String,
    pub site: String,
    pub last_action: String,
    pub global_enabled: bool,
    pub dry_run: bool,
    pub site_enabled: bool,
    /// Per-site switch is only offered on http(s) pages with an origin
    pub site_switch_available: bool,
}

impl PopupView {
    /// Build the view from a `get_tab_status` reply.
    pub fn build(url: &str, reply: &Response) -> Self {
        let origin = Origin::of(url);
        let site_switch_available = origin.is_some() && ac_core::origin::is_http_url(url);
        let last = reply.last_activation();

        let (status, global_enabled, dry_run, site_enabled) = match reply.status() {
            Some(state) => (
                status_text(&state).to_string(),
                state.global_enabled,
                state.dry_run,
                state.site_enabled,
            ),
            None => (STATUS_UNAVAILABLE.to_string(), false, false, true),
        };

        Self {
            status,
            site: site_text(origin.as_ref()),
            last_action: last_action_text(last.as_ref()),
            global_enabled,
            dry_run,
            site_enabled,
            site_switch_available,
        }
    }
}
