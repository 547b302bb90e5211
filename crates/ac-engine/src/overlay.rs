//! Page overlay text

use ac_core::EffectiveActivationState;
use chrono::{DateTime, Local};

pub const NO_ACTIVATIONS_YET: &str = "No clicks yet";

/// Overlay line for an active page, `None` when the overlay should be hidden.
pub fn overlay_text(state: &EffectiveActivationState, last_activation_iso: Option<&str>) -> Option<String> {
    if !state.active {
        return None;
    }
    let mode = if state.dry_run { "DRY-RUN" } else { "LIVE" };
    let last = match last_activation_iso {
        Some(iso) => local_time(iso),
        None => NO_ACTIVATIONS_YET.to_string(),
    };
    Some(format!("Auto-click active ({}) | Last: {}", mode, last))
}

/// `HH:MM:SS` in local time, or the raw value if it is not RFC 3339.
fn local_time(iso: &str) -> String {
    DateTime::parse_from_rfc3339(iso)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| iso.to_string())
}
