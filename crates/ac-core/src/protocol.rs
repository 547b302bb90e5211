//! Control-surface message types
//!
//! Requests are JSON objects discriminated by a `type` field. Every request
//! gets exactly one response: `{ok: true, ...payload}` or
//! `{ok: false, error: "<code>"}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::settings::{ActivationRecord, EditableSettings};
use crate::status::EffectiveActivationState;

/// Error code for a request whose `type` is not recognized.
pub const UNKNOWN_MESSAGE_TYPE: &str = "unknown_message_type";

/// Error code for a request naming an unusable URL/origin.
pub const INVALID_ORIGIN: &str = "invalid_origin";

/// Message from a control surface or page context to the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Effective state for a page URL
    GetTabStatus {
        #[serde(default)]
        url: String,
    },

    /// Flip the master switch
    ToggleGlobal,

    SetGlobalEnabled {
        #[serde(default)]
        enabled: bool,
    },

    SetDryRun {
        #[serde(default)]
        enabled: bool,
    },

    /// Per-origin switch; `origin` may be any URL on the site
    SetSiteEnabled {
        #[serde(default)]
        origin: String,
        #[serde(default)]
        enabled: bool,
    },

    /// Outcome of an activation on a page
    ReportClick {
        #[serde(default)]
        origin: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at: Option<String>,
        #[serde(default, rename = "dryRun", alias = "dry_run")]
        dry_run: bool,
    },

    /// The user switched to another page
    TabActivated {
        #[serde(default)]
        url: String,
    },

    /// Settings surface save
    SaveSettings { settings: EditableSettings },

    /// Settings surface reset
    ResetDefaults,
}

impl Request {
    /// Every `type` value this protocol understands.
    pub const TYPES: [&'static str; 9] = [
        "get_tab_status",
        "toggle_global",
        "set_global_enabled",
        "set_dry_run",
        "set_site_enabled",
        "report_click",
        "tab_activated",
        "save_settings",
        "reset_defaults",
    ];

    /// Decode a raw JSON request, telling unknown types apart from malformed ones.
    pub fn from_json(value: Value) -> Result<Self, RequestError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(RequestError::UnknownType)?;
        if !Self::TYPES.contains(&kind) {
            return Err(RequestError::UnknownType);
        }
        serde_json::from_value(value).map_err(|e| RequestError::Malformed(e.to_string()))
    }

    /// Wire name of this request.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetTabStatus { .. } => "get_tab_status",
            Self::ToggleGlobal => "toggle_global",
            Self::SetGlobalEnabled { .. } => "set_global_enabled",
            Self::SetDryRun { .. } => "set_dry_run",
            Self::SetSiteEnabled { .. } => "set_site_enabled",
            Self::ReportClick { .. } => "report_click",
            Self::TabActivated { .. } => "tab_activated",
            Self::SaveSettings { .. } => "save_settings",
            Self::ResetDefaults => "reset_defaults",
        }
    }
}

/// Why a raw request could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("unknown_message_type")]
    UnknownType,
    #[error("invalid_request: {0}")]
    Malformed(String),
}

/// Reply to a [`Request`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Response {
    /// Successful response with no payload
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
            payload: Map::new(),
        }
    }

    /// Failure response with a stable error code or message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            payload: Map::new(),
        }
    }

    /// Add a payload field
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// The `status` payload of a `get_tab_status` reply.
    pub fn status(&self) -> Option<EffectiveActivationState> {
        if !self.ok {
            return None;
        }
        self.get("status")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The `last_activation` payload of a `get_tab_status` reply.
    pub fn last_activation(&self) -> Option<ActivationRecord> {
        self.get("last_activation")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Request/response channel to the coordinator.
///
/// Implementations answer every request exactly once; transport failures
/// come back as `{ok: false, error}` rather than as an `Err`.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, request: Request) -> Response;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_request() {
        let msg = Request::SetSiteEnabled {
            origin: "https://example.com".to_string(),
            enabled: false,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"set_site_enabled""#));
        assert!(json.contains(r#""enabled":false"#));
    }

    #[test]
    fn test_deserialize_report_click() {
        let msg = Request::from_json(json!({
            "type": "report_click",
            "origin": "https://example.com",
            "label": "Submit Form",
            "at": "2026-10-18T10:00:00Z",
            "dryRun": true
        }))
        .unwrap();
        match msg {
            Request::ReportClick { label, dry_run, .. } => {
                assert_eq!(label.as_deref(), Some("Submit Form"));
                assert!(dry_run);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_unit_variants_from_json() {
        let msg = Request::from_json(json!({"type": "toggle_global"})).unwrap();
        assert_eq!(msg, Request::ToggleGlobal);
        assert_eq!(msg.kind(), "toggle_global");
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            Request::from_json(json!({"type": "launch_rockets"})),
            Err(RequestError::UnknownType)
        );
        assert_eq!(Request::from_json(json!({"url": "x"})), Err(RequestError::UnknownType));
        assert_eq!(RequestError::UnknownType.to_string(), UNKNOWN_MESSAGE_TYPE);
    }

    #[test]
    fn test_malformed_known_type() {
        let err = Request::from_json(json!({"type": "save_settings"})).unwrap_err();
        assert!(matches!(err, RequestError::Malformed(_)));
    }

    #[test]
    fn test_every_type_is_listed() {
        let samples = [
            Request::GetTabStatus { url: String::new() },
            Request::ToggleGlobal,
            Request::SetGlobalEnabled { enabled: true },
            Request::SetDryRun { enabled: true },
            Request::SetSiteEnabled { origin: String::new(), enabled: true },
            Request::ReportClick { origin: String::new(), label: None, at: None, dry_run: false },
            Request::TabActivated { url: String::new() },
            Request::ResetDefaults,
        ];
        for sample in samples {
            assert!(Request::TYPES.contains(&sample.kind()));
        }
    }

    #[test]
    fn test_response_shape() {
        let ok = Response::success().with("global_enabled", true).to_json();
        assert_eq!(ok, json!({"ok": true, "global_enabled": true}));

        let err = Response::failure(UNKNOWN_MESSAGE_TYPE).to_json();
        assert_eq!(err, json!({"ok": false, "error": "unknown_message_type"}));
    }

    #[test]
    fn test_response_round_trip_payload() {
        let parsed: Response =
            serde_json::from_value(json!({"ok": true, "dry_run": false})).unwrap();
        assert!(parsed.ok);
        assert_eq!(parsed.get("dry_run"), Some(&json!(false)));
        assert!(parsed.error.is_none());
    }
}
