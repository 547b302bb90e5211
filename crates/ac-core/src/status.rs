//! Effective activation state
//!
//! A pure projection of [`Settings`] onto one page URL. It is never persisted
//! and is recomputed from a full settings snapshot on every refresh.

use serde::{Deserialize, Serialize};

use crate::origin::Origin;
use crate::settings::Settings;

/// Whether automation may act on a given page, and why (not).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveActivationState {
    /// Normalized origin, empty when the URL has none
    pub origin: String,
    pub global_enabled: bool,
    pub dry_run: bool,
    pub site_enabled: bool,
    pub allowlisted: bool,
    /// `global_enabled && site_enabled && allowlisted`
    pub active: bool,
}

impl EffectiveActivationState {
    pub fn compute(settings: &Settings, url: &str) -> Self {
        let origin = Origin::of(url);
        let site_enabled = settings.site_enabled(origin.as_ref());
        let allowlisted = settings.is_allowlisted(url);
        let global_enabled = settings.global_enabled;

        Self {
            origin: origin.map(|o| o.to_string()).unwrap_or_default(),
            global_enabled,
            dry_run: settings.dry_run,
            site_enabled,
            allowlisted,
            active: global_enabled && site_enabled && allowlisted,
        }
    }

    /// State of a context that has not loaded settings yet.
    pub fn inactive() -> Self {
        Self {
            origin: String::new(),
            global_enabled: false,
            dry_run: true,
            site_enabled: false,
            allowlisted: false,
            active: false,
        }
    }

    pub fn indicator(&self) -> Indicator {
        Indicator::for_state(self)
    }
}

/// Badge shown for a page, driven purely by its effective state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Inactive (neutral)
    Off,
    /// Active, simulating
    DryRun,
    /// Active, performing activations
    Live,
    /// Enabled globally but the URL is not allow-listed
    Blocked,
}

impl Indicator {
    pub fn for_state(state: &EffectiveActivationState) -> Self {
        if state.active {
            if state.dry_run { Self::DryRun } else { Self::Live }
        } else if state.global_enabled && !state.allowlisted {
            Self::Blocked
        } else {
            Self::Off
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::DryRun => "DRY",
            Self::Live => "ON",
            Self::Blocked => "WL",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Off => "#6b7280",
            Self::DryRun => "#d97706",
            Self::Live => "#15803d",
            Self::Blocked => "#b91c1c",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlisted_settings() -> Settings {
        Settings {
            global_enabled: true,
            allowlist_patterns: vec!["https://example.com/*".to_string()],
            ..Settings::default()
        }
    }

    #[test]
    fn test_active_is_exact_conjunction() {
        let url = "https://example.com/form";
        for global in [false, true] {
            for site in [false, true] {
                for listed in [false, true] {
                    let mut settings = Settings {
                        global_enabled: global,
                        ..Settings::default()
                    };
                    if listed {
                        settings.allowlist_patterns.push("https://example.com/*".into());
                    }
                    if !site {
                        settings.site_overrides.insert("https://example.com".into(), false);
                    }
                    let state = EffectiveActivationState::compute(&settings, url);
                    assert_eq!(state.global_enabled, global);
                    assert_eq!(state.site_enabled, site);
                    assert_eq!(state.allowlisted, listed);
                    assert_eq!(state.active, global && site && listed);
                }
            }
        }
    }

    #[test]
    fn test_url_without_origin_is_never_active() {
        let settings = Settings {
            allowlist_patterns: vec!["*".to_string()],
            ..allowlisted_settings()
        };
        let state = EffectiveActivationState::compute(&settings, "about:blank");
        assert_eq!(state.origin, "");
        assert!(state.allowlisted);
        assert!(!state.site_enabled);
        assert!(!state.active);
    }

    #[test]
    fn test_indicator_variants() {
        let mut settings = allowlisted_settings();
        let url = "https://example.com/form";

        assert_eq!(EffectiveActivationState::compute(&settings, url).indicator(), Indicator::DryRun);

        settings.dry_run = false;
        assert_eq!(EffectiveActivationState::compute(&settings, url).indicator(), Indicator::Live);

        let blocked = EffectiveActivationState::compute(&settings, "https://other.test/");
        assert_eq!(blocked.indicator(), Indicator::Blocked);
        assert_eq!(blocked.indicator().text(), "WL");

        settings.global_enabled = false;
        let off = EffectiveActivationState::compute(&settings, url);
        assert_eq!(off.indicator(), Indicator::Off);
        assert_eq!(off.indicator().color(), "#6b7280");
    }

    #[test]
    fn test_serializes_camel_case() {
        let state = EffectiveActivationState::compute(&allowlisted_settings(), "https://example.com/");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["globalEnabled"], true);
        assert_eq!(json["siteEnabled"], true);
        assert_eq!(json["origin"], "https://example.com");
    }
}
