//! Wire format for the manager's UI channel.
//!
//! Every frame is a JSON object carrying a `webuiCommand` discriminator. The
//! remaining fields depend on the kind.
//!
//! ## Server → client
//!
//! | `webuiCommand`     | Fields                                          |
//! |--------------------|-------------------------------------------------|
//! | `NEW_CONNECTION`   | `output: string[]`, `paused: bool`              |
//! | `ADDED_CONFIG`     | `config`, `totalRunCount`, `resultDir`          |
//! | `COMPLETED_CONFIG` | `config`                                        |
//! | `STARTED_RUN`      | `config`, `run`                                 |
//! | `COMPLETED_RUN`    | `config`, `run`, `duration`                     |
//! | `FAILED_RUN`       | `config`, `run`                                 |
//! | `DISPLAY_LOG`      | `line`                                          |
//! | `SHUTDOWN`         | —                                               |
//!
//! ## Client → server
//!
//! | `webuiCommand` | Fields              |
//! |----------------|---------------------|
//! | `SHUTDOWN`     | `graceful?: bool`   |

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Name of the discriminator field present on every frame.
pub const DISCRIMINATOR: &str = "webuiCommand";

pub const NEW_CONNECTION: &str = "NEW_CONNECTION";
pub const ADDED_CONFIG: &str = "ADDED_CONFIG";
pub const COMPLETED_CONFIG: &str = "COMPLETED_CONFIG";
pub const STARTED_RUN: &str = "STARTED_RUN";
pub const COMPLETED_RUN: &str = "COMPLETED_RUN";
pub const FAILED_RUN: &str = "FAILED_RUN";
pub const DISPLAY_LOG: &str = "DISPLAY_LOG";
pub const SHUTDOWN: &str = "SHUTDOWN";

/// A decoded inbound frame: its discriminator plus the remaining fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: String,
    pub fields: Map<String, Value>,
}

impl Frame {
    /// Deserialize the frame's fields into a kind-specific payload.
    ///
    /// Unknown fields (including the discriminator) are ignored, so a newer
    /// manager may add fields without breaking older clients.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

/// Parse one text frame.
///
/// Fails on invalid JSON, on non-object payloads and on a missing or
/// non-string discriminator. Callers drop the frame on error.
pub fn decode(text: &str) -> Result<Frame, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut fields) = value else {
        return Err(DecodeError::NotAnObject);
    };
    let kind = match fields.remove(DISCRIMINATOR) {
        Some(Value::String(kind)) => kind,
        _ => return Err(DecodeError::MissingDiscriminator),
    };
    Ok(Frame { kind, fields })
}

/// Build an outbound frame: `fields` (if any) merged with the discriminator.
///
/// A discriminator already present in `fields` is overwritten by `kind`.
pub fn encode(kind: &str, fields: Option<Map<String, Value>>) -> String {
    let mut map = fields.unwrap_or_default();
    map.insert(DISCRIMINATOR.to_string(), Value::String(kind.to_string()));
    // A map of JSON values always serializes.
    serde_json::to_string(&Value::Object(map)).unwrap_or_default()
}

/// Commands the operator can send to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Request manager shutdown. `graceful` is omitted from the frame when
    /// `None`, matching managers that no longer read it.
    Shutdown { graceful: Option<bool> },
}

impl ClientCommand {
    /// Discriminator value for this command.
    pub fn kind(self) -> &'static str {
        match self {
            Self::Shutdown { .. } => SHUTDOWN,
        }
    }

    /// Serialize to a wire frame.
    pub fn to_frame(self) -> String {
        match self {
            Self::Shutdown { graceful: None } => encode(self.kind(), None),
            Self::Shutdown {
                graceful: Some(graceful),
            } => {
                let mut fields = Map::new();
                fields.insert("graceful".to_string(), Value::Bool(graceful));
                encode(self.kind(), Some(fields))
            }
        }
    }
}

/// `NEW_CONNECTION` — initial snapshot sent once per connection.
#[derive(Debug, Clone, Deserialize)]
pub struct NewConnection {
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub paused: bool,
}

/// `ADDED_CONFIG`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedConfig {
    pub config: String,
    #[serde(default)]
    pub total_run_count: u32,
    #[serde(default)]
    pub result_dir: String,
}

/// `COMPLETED_CONFIG`
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedConfig {
    pub config: String,
}

/// `STARTED_RUN` and `FAILED_RUN`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRef {
    pub config: String,
    pub run: u32,
}

/// `COMPLETED_RUN`
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedRun {
    pub config: String,
    pub run: u32,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// `DISPLAY_LOG`
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayLog {
    pub line: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_splits_discriminator_from_fields() {
        let frame = decode(r#"{"webuiCommand":"STARTED_RUN","config":"K0","run":3}"#).unwrap();
        assert_eq!(frame.kind, STARTED_RUN);
        assert!(!frame.fields.contains_key(DISCRIMINATOR));
        let run: RunRef = frame.payload().unwrap();
        assert_eq!(run.config, "K0");
        assert_eq!(run.run, 3);
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(""), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn decode_rejects_non_object() {
        assert!(matches!(decode("[1,2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode("\"SHUTDOWN\""), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn decode_rejects_missing_or_non_string_discriminator() {
        assert!(matches!(
            decode(r#"{"config":"K0"}"#),
            Err(DecodeError::MissingDiscriminator)
        ));
        assert!(matches!(
            decode(r#"{"webuiCommand":7}"#),
            Err(DecodeError::MissingDiscriminator)
        ));
    }

    #[test]
    fn decode_keeps_unknown_kinds() {
        let frame = decode(r#"{"webuiCommand":"PAUSED_RUNS","extra":true}"#).unwrap();
        assert_eq!(frame.kind, "PAUSED_RUNS");
        assert_eq!(frame.fields.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn encode_without_fields_is_discriminator_only() {
        let text = encode(SHUTDOWN, None);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"webuiCommand": "SHUTDOWN"}));
    }

    #[test]
    fn encode_merges_fields_and_overrides_discriminator() {
        let mut fields = Map::new();
        fields.insert("graceful".into(), json!(false));
        fields.insert(DISCRIMINATOR.into(), json!("BOGUS"));
        let value: Value = serde_json::from_str(&encode(SHUTDOWN, Some(fields))).unwrap();
        assert_eq!(value, json!({"webuiCommand": "SHUTDOWN", "graceful": false}));
    }

    #[test]
    fn shutdown_command_omits_graceful_when_unset() {
        let bare: Value =
            serde_json::from_str(&ClientCommand::Shutdown { graceful: None }.to_frame()).unwrap();
        assert_eq!(bare, json!({"webuiCommand": "SHUTDOWN"}));

        let graceful: Value = serde_json::from_str(
            &ClientCommand::Shutdown {
                graceful: Some(true),
            }
            .to_frame(),
        )
        .unwrap();
        assert_eq!(graceful, json!({"webuiCommand": "SHUTDOWN", "graceful": true}));
    }

    #[test]
    fn added_config_uses_camel_case_fields() {
        let frame = decode(
            r#"{"webuiCommand":"ADDED_CONFIG","config":"K0","totalRunCount":2,"resultDir":"/r"}"#,
        )
        .unwrap();
        let added: AddedConfig = frame.payload().unwrap();
        assert_eq!(added.total_run_count, 2);
        assert_eq!(added.result_dir, "/r");
    }

    #[test]
    fn payload_mismatch_is_an_error() {
        let frame = decode(r#"{"webuiCommand":"STARTED_RUN","config":"K0","run":"zero"}"#).unwrap();
        assert!(frame.payload::<RunRef>().is_err());
    }
}
