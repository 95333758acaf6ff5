//! Message shapes of the worker protocol.
//!
//! Outbound: `{action, _callId, ...params}`.
//! Inbound, one of:
//! - `{"type":"ready"}`
//! - `{"type":"progress", phase?, phaseName?, progress, message?, subtype?}`
//! - `{"type":"info"|"error", message}` without a `success` field
//! - a command response `{success, _callId?, error?, traceback?, ...fields}`

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use reviewlens_core::ProgressEvent;

use crate::codec::CALL_ID_FIELD;
use crate::error::BridgeError;

/// A command for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    action: String,
    params: Map<String, Value>,
}

impl WorkerCommand {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Map::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }
}

/// A command response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    pub success: bool,
    #[serde(rename = "_callId", skip_serializing_if = "Option::is_none")]
    pub call_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    /// Every other field of the response.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WorkerResponse {
    /// Split a response object into its protocol fields and its result fields.
    ///
    /// Never fails: a missing or non-boolean `success` reads as `false`, a
    /// non-integer `_callId` as absent.
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        let success = object
            .remove("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let call_id = object.remove(CALL_ID_FIELD).and_then(|v| v.as_u64());
        let error = take_string(&mut object, "error");
        let traceback = take_string(&mut object, "traceback");

        Self {
            success,
            call_id,
            error,
            traceback,
            fields: object,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Deserialize one result field.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fields
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Turn an unsuccessful response into [`BridgeError::Worker`].
    pub fn into_result(self) -> Result<Self, BridgeError> {
        if self.success {
            Ok(self)
        } else {
            Err(BridgeError::Worker {
                error: self
                    .error
                    .unwrap_or_else(|| "worker reported failure".to_string()),
                traceback: self.traceback,
            })
        }
    }
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Classification of one decoded inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Ready,
    Progress(ProgressEvent),
    Notice { level: NoticeLevel, message: String },
    Response(WorkerResponse),
    /// Not a protocol message (e.g. a bare JSON scalar or a bad progress line).
    Ignored(String),
}

/// Classify a decoded JSON line.
pub fn classify(value: Value) -> Inbound {
    let object = match value {
        Value::Object(object) => object,
        other => return Inbound::Ignored(format!("non-object line: {other}")),
    };

    let kind = object.get("type").and_then(Value::as_str);
    let has_success = object.contains_key("success");

    match kind {
        Some("ready") => Inbound::Ready,
        Some("progress") => match serde_json::from_value(Value::Object(object)) {
            Ok(event) => Inbound::Progress(event),
            Err(e) => Inbound::Ignored(format!("bad progress message: {e}")),
        },
        Some(level @ ("info" | "error")) if !has_success => {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let level = if level == "info" {
                NoticeLevel::Info
            } else {
                NoticeLevel::Error
            };
            Inbound::Notice { level, message }
        }
        _ => Inbound::Response(WorkerResponse::from_object(object)),
    }
}
