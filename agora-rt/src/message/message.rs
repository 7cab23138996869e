// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
// (none)

/// Application message, discriminated on its `kind` string.
///
/// The runtime never interprets the payload; handlers pattern-match on
/// `kind` and read payload fields as needed. This keeps the message grammar
/// open to applications while the runtime stays type-agnostic.
///
/// # Example
/// ```rust
/// use agora_rt::message::Message;
/// use serde_json::json;
///
/// let ping = Message::with_payload("PING", json!({"n": 42}));
/// assert_eq!(ping.kind(), "PING");
/// assert_eq!(ping.payload()["n"], 42);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message discriminant, application-defined
    #[serde(rename = "type")]
    kind: String,

    /// Opaque JSON payload
    #[serde(default, skip_serializing_if = "Value::is_null")]
    payload: Value,
}

impl Message {
    /// Create a message with no payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
        }
    }

    /// Create a message carrying a JSON payload.
    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// The message discriminant.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The message payload (`Value::Null` when absent).
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Read a payload field by key, if the payload is an object.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Read a string payload field.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// Read an integer payload field.
    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.field(key).and_then(Value::as_i64)
    }

    /// Read a boolean payload field.
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.field(key).and_then(Value::as_bool)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_without_payload() {
        let msg = Message::new("SHUTDOWN");
        assert_eq!(msg.kind(), "SHUTDOWN");
        assert!(msg.payload().is_null());
    }

    #[test]
    fn test_message_with_payload() {
        let msg = Message::with_payload("N", json!({"i": 3}));
        assert_eq!(msg.i64_field("i"), Some(3));
        assert_eq!(msg.str_field("i"), None);
        assert_eq!(msg.field("missing"), None);
    }

    #[test]
    fn test_message_serde_wire_shape() {
        let msg = Message::with_payload("PING", json!({"n": 42}));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, json!({"type": "PING", "payload": {"n": 42}}));

        let bare = Message::new("PING");
        let json = serde_json::to_value(&bare).unwrap();
        assert_eq!(json, json!({"type": "PING"}));
    }

    #[test]
    fn test_message_deserialize_defaults_payload() {
        let msg: Message = serde_json::from_value(json!({"type": "Q"})).unwrap();
        assert_eq!(msg.kind(), "Q");
        assert!(msg.payload().is_null());
    }
}
