//! JSON message types spoken between UI surfaces and the daemon.
//!
//! The same shapes are used on both transports: a standing WebSocket channel
//! and a one-shot request socket.
//!
//! # Message flow
//!
//! ```text
//! UI surface → daemon:  {"action":"connect","config":{"raw":"remote ..."}}   Request
//! daemon → UI surface:  {"success":true}                                    Response
//! daemon → UI surface:  {"type":"status","connected":true,"config":"..."}   PushNotification
//! ```
//!
//! Requests are discriminated by their `"action"` field and pushes by their
//! `"type"` field (serde's internally tagged representation).  Responses carry
//! no discriminant; their shape depends on the request that produced them, so
//! [`Response`] serialises itself by hand.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::domain::config::ParseFailure;
use crate::domain::connection::Snapshot;

// ── Requests ──────────────────────────────────────────────────────────────────

/// The `config` value carried by `connect` and `saveConfig`.
///
/// Expected shape is `{"raw": "<config text>"}`, but the value is kept as
/// untyped JSON so that any other shape (a bare string, a number, an object
/// whose `raw` is not a string) still decodes and is reported as
/// [`ParseFailure::InvalidInput`] by [`ConfigPayload::text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigPayload(serde_json::Value);

impl ConfigPayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(serde_json::json!({ "raw": raw.into() }))
    }

    /// Returns the configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure::InvalidInput`] when the value is not an object,
    /// or its `raw` field is missing or not a JSON string.
    pub fn text(&self) -> Result<&str, ParseFailure> {
        let object = self.0.as_object().ok_or_else(|| {
            ParseFailure::InvalidInput(format!(
                "expected a config object, got {}",
                json_kind(&self.0)
            ))
        })?;
        let raw = object.get("raw").unwrap_or(&serde_json::Value::Null);
        raw.as_str().ok_or_else(|| {
            ParseFailure::InvalidInput(format!("expected config text, got {}", json_kind(raw)))
        })
    }
}

impl From<serde_json::Value> for ConfigPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Every request a UI surface can make.
///
/// ```json
/// {"action":"connect","config":{"raw":"remote vpn.example.com 1194 udp\n"}}
/// {"action":"disconnect"}
/// {"action":"getStatus"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Validate and activate a configuration, then bring the tunnel up.
    Connect {
        #[serde(default)]
        config: Option<ConfigPayload>,
    },
    /// Bring the tunnel down.
    Disconnect,
    /// Read `{connected, config}`.
    GetStatus,
    /// Validate and activate a configuration without touching the tunnel.
    SaveConfig {
        #[serde(default)]
        config: Option<ConfigPayload>,
    },
    /// Read the active configuration text.
    GetConfig,
}

impl Request {
    pub fn connect(raw: impl Into<String>) -> Self {
        Request::Connect {
            config: Some(ConfigPayload::new(raw)),
        }
    }

    pub fn save_config(raw: impl Into<String>) -> Self {
        Request::SaveConfig {
            config: Some(ConfigPayload::new(raw)),
        }
    }

    /// Short name for log lines.
    ///
    /// Configuration documents embed private keys, so request bodies are never
    /// logged; only this name is.
    pub fn action_name(&self) -> &'static str {
        match self {
            Request::Connect { .. } => "connect",
            Request::Disconnect => "disconnect",
            Request::GetStatus => "getStatus",
            Request::SaveConfig { .. } => "saveConfig",
            Request::GetConfig => "getConfig",
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// The reply to one [`Request`].
///
/// | Variant   | JSON                                                   |
/// |-----------|--------------------------------------------------------|
/// | `Ack`     | `{"success":true}`                                     |
/// | `Status`  | `{"success":true,"connected":bool,"config":str\|null}` |
/// | `Config`  | `{"success":true,"config":str\|null}`                  |
/// | `Failure` | `{"success":false,"error":str}`                        |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "WireResponse")]
pub enum Response {
    Ack,
    Status {
        connected: bool,
        config: Option<String>,
    },
    Config {
        config: Option<String>,
    },
    Failure {
        error: String,
    },
}

impl Response {
    pub fn failure(error: impl ToString) -> Self {
        Response::Failure {
            error: error.to_string(),
        }
    }

    pub fn status(snapshot: &Snapshot) -> Self {
        Response::Status {
            connected: snapshot.connected(),
            config: snapshot.raw_config().map(str::to_string),
        }
    }

    pub fn config(snapshot: &Snapshot) -> Self {
        Response::Config {
            config: snapshot.raw_config().map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Response::Failure { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Response::Failure { error } => Some(error),
            _ => None,
        }
    }
}

impl From<Result<(), ParseFailure>> for Response {
    fn from(result: Result<(), ParseFailure>) -> Self {
        match result {
            Ok(()) => Response::Ack,
            Err(e) => Response::failure(e),
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("success", &self.is_success())?;
        match self {
            Response::Ack => {}
            Response::Status { connected, config } => {
                map.serialize_entry("connected", connected)?;
                map.serialize_entry("config", config)?;
            }
            Response::Config { config } => {
                map.serialize_entry("config", config)?;
            }
            Response::Failure { error } => {
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

/// Flat view of any response, used to decode one on the client side.
///
/// `config` is a double option so that `"config": null` (present, no config)
/// can be told apart from a missing field (an `Ack`).
#[derive(Deserialize)]
struct WireResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    connected: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    config: Option<Option<String>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<WireResponse> for Response {
    fn from(wire: WireResponse) -> Self {
        if !wire.success {
            return Response::Failure {
                error: wire.error.unwrap_or_default(),
            };
        }
        match (wire.connected, wire.config) {
            (Some(connected), config) => Response::Status {
                connected,
                config: config.flatten(),
            },
            (None, Some(config)) => Response::Config { config },
            (None, None) => Response::Ack,
        }
    }
}

// ── Push notifications ────────────────────────────────────────────────────────

/// A state snapshot pushed down a standing channel.
///
/// `Init` is sent once when the channel subscribes; `Status` after every
/// subsequent state change.
///
/// ```json
/// {"type":"init","connected":false,"config":null}
/// {"type":"status","connected":true,"config":"remote vpn.example.com 1194 udp\n"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PushNotification {
    Init {
        connected: bool,
        config: Option<String>,
    },
    Status {
        connected: bool,
        config: Option<String>,
    },
}

impl PushNotification {
    pub fn init(snapshot: &Snapshot) -> Self {
        PushNotification::Init {
            connected: snapshot.connected(),
            config: snapshot.raw_config().map(str::to_string),
        }
    }

    pub fn status(snapshot: &Snapshot) -> Self {
        PushNotification::Status {
            connected: snapshot.connected(),
            config: snapshot.raw_config().map(str::to_string),
        }
    }

    pub fn connected(&self) -> bool {
        match self {
            PushNotification::Init { connected, .. } | PushNotification::Status { connected, .. } => {
                *connected
            }
        }
    }

    pub fn config(&self) -> Option<&str> {
        match self {
            PushNotification::Init { config, .. } | PushNotification::Status { config, .. } => {
                config.as_deref()
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::parse_config;
    use crate::domain::connection::{ConnectionRecord, ConnectionStatus};
    use serde_json::json;

    fn connected_snapshot() -> Snapshot {
        let mut record = ConnectionRecord::new();
        record.status = ConnectionStatus::Connected;
        record.active_config = Some(parse_config("remote a 1\n").unwrap());
        record.snapshot()
    }

    // ── Request decoding ──────────────────────────────────────────────────────

    #[test]
    fn test_connect_request_deserializes_from_json() {
        // Arrange: what a UI surface would send
        let json = r#"{"action":"connect","config":{"raw":"remote a 1\n"}}"#;

        // Act
        let request: Request = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(request, Request::connect("remote a 1\n"));
    }

    #[test]
    fn test_unit_requests_use_camel_case_actions() {
        let cases = [
            (r#"{"action":"disconnect"}"#, Request::Disconnect),
            (r#"{"action":"getStatus"}"#, Request::GetStatus),
            (r#"{"action":"getConfig"}"#, Request::GetConfig),
        ];
        for (json, expected) in cases {
            assert_eq!(serde_json::from_str::<Request>(json).unwrap(), expected);
        }
    }

    #[test]
    fn test_save_config_serializes_with_action_discriminant() {
        let json = serde_json::to_value(Request::save_config("x")).unwrap();
        assert_eq!(json, json!({"action":"saveConfig","config":{"raw":"x"}}));
    }

    #[test]
    fn test_connect_without_config_object_decodes_as_none() {
        let request: Request = serde_json::from_str(r#"{"action":"connect"}"#).unwrap();
        assert_eq!(request, Request::Connect { config: None });
    }

    #[test]
    fn test_unknown_action_returns_error() {
        let result: Result<Request, _> = serde_json::from_str(r#"{"action":"reboot"}"#);
        assert!(result.is_err(), "unknown action must produce a deserialization error");
    }

    #[test]
    fn test_missing_action_field_returns_error() {
        let result: Result<Request, _> = serde_json::from_str(r#"{"config":{"raw":"x"}}"#);
        assert!(result.is_err());
    }

    // ── Payload validation ────────────────────────────────────────────────────

    #[test]
    fn test_non_string_raw_is_invalid_input() {
        // Arrange
        let request: Request =
            serde_json::from_str(r#"{"action":"saveConfig","config":{"raw":42}}"#).unwrap();
        let Request::SaveConfig { config: Some(payload) } = request else {
            panic!("expected SaveConfig with payload");
        };

        // Act
        let result = payload.text();

        // Assert
        assert!(matches!(result, Err(ParseFailure::InvalidInput(ref m)) if m.contains("a number")));
    }

    #[test]
    fn test_bare_string_config_decodes_and_is_invalid_input() {
        // Arrange: text sent directly instead of {"raw": ...}
        let json = r#"{"action":"connect","config":"remote a 1\n"}"#;

        // Act
        let request: Request = serde_json::from_str(json).unwrap();
        let Request::Connect { config: Some(payload) } = request else {
            panic!("expected Connect with payload");
        };

        // Assert
        assert_eq!(
            payload.text(),
            Err(ParseFailure::InvalidInput(
                "expected a config object, got a string".to_string()
            ))
        );
    }

    #[test]
    fn test_missing_raw_is_invalid_input() {
        let payload: ConfigPayload = serde_json::from_str("{}").unwrap();
        assert!(matches!(payload.text(), Err(ParseFailure::InvalidInput(_))));
    }

    #[test]
    fn test_action_name_never_includes_config_text() {
        let request = Request::connect("<key>\nSECRET\n</key>\n");
        assert_eq!(request.action_name(), "connect");
    }

    // ── Response encoding ─────────────────────────────────────────────────────

    #[test]
    fn test_ack_serializes_as_success_only() {
        assert_eq!(serde_json::to_value(Response::Ack).unwrap(), json!({"success": true}));
    }

    #[test]
    fn test_failure_serializes_error() {
        let response = Response::failure(ParseFailure::NoRemoteFound);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": false, "error": "No remote servers found in config"})
        );
    }

    #[test]
    fn test_status_serializes_null_config_explicitly() {
        let response = Response::status(&ConnectionRecord::new().snapshot());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "connected": false, "config": null})
        );
    }

    #[test]
    fn test_config_response_carries_raw_text() {
        let response = Response::config(&connected_snapshot());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "config": "remote a 1\n"})
        );
    }

    #[test]
    fn test_responses_decode_back_to_their_variant() {
        let responses = [
            Response::Ack,
            Response::status(&connected_snapshot()),
            Response::Config { config: None },
            Response::failure("boom"),
        ];
        for original in responses {
            let json = serde_json::to_string(&original).unwrap();
            let decoded: Response = serde_json::from_str(&json).unwrap();
            assert_eq!(decoded, original, "json was {json}");
        }
    }

    // ── Push notifications ────────────────────────────────────────────────────

    #[test]
    fn test_init_push_serializes_with_type_discriminant() {
        let push = PushNotification::init(&ConnectionRecord::new().snapshot());
        assert_eq!(
            serde_json::to_value(&push).unwrap(),
            json!({"type": "init", "connected": false, "config": null})
        );
    }

    #[test]
    fn test_status_push_reflects_snapshot() {
        let push = PushNotification::status(&connected_snapshot());
        assert!(push.connected());
        assert_eq!(push.config(), Some("remote a 1\n"));
        assert!(serde_json::to_string(&push).unwrap().contains(r#""type":"status""#));
    }
}
