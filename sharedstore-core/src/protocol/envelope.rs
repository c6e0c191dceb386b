/*
    Envelope - the tagged payload carried on every protocol message.

    Wire shape (a plain JSON object, so it can share a channel with
    application payloads):

        { "tag": API_TAG, "operation": "setItem", "arguments": ["k", 1] }

    Operations:
    - setItem(key, value)       worker -> owner
    - removeItem(key)           worker -> owner
    - requestUpdate()           worker -> owner, once at bootstrap
    - updateStorage(snapshot)   owner  -> worker

    The tag is a compile-time constant. Every context links the same
    constant, so a mismatch means "not ours" and never an error.
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::error::ProtocolError;
use crate::store::Snapshot;

/// Shared secret identifying protocol traffic on a channel.
pub const API_TAG: &str = "sh-apis0001-7292d3c5-0eb71d00-8ed8a340";

/// Operation names understood by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetItem,
    RemoveItem,
    RequestUpdate,
    UpdateStorage,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SetItem => "setItem",
            Operation::RemoveItem => "removeItem",
            Operation::RequestUpdate => "requestUpdate",
            Operation::UpdateStorage => "updateStorage",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setItem" => Ok(Operation::SetItem),
            "removeItem" => Ok(Operation::RemoveItem),
            "requestUpdate" => Ok(Operation::RequestUpdate),
            "updateStorage" => Ok(Operation::UpdateStorage),
            other => Err(ProtocolError::UnknownOperation(other.to_string())),
        }
    }
}

/// A protocol message
///
/// `operation` stays a raw string so that a tagged message carrying an
/// operation this build does not know can still be decoded and logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub tag: String,
    pub operation: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl Envelope {
    /// Build a tagged envelope
    pub fn new(operation: Operation, arguments: Vec<Value>) -> Self {
        Envelope {
            tag: API_TAG.to_string(),
            operation: operation.as_str().to_string(),
            arguments,
        }
    }

    pub fn set_item(key: &str, value: Value) -> Self {
        Self::new(Operation::SetItem, vec![Value::String(key.to_string()), value])
    }

    pub fn remove_item(key: &str) -> Self {
        Self::new(Operation::RemoveItem, vec![Value::String(key.to_string())])
    }

    pub fn request_update() -> Self {
        Self::new(Operation::RequestUpdate, Vec::new())
    }

    pub fn update_storage(snapshot: &Snapshot) -> Result<Self, ProtocolError> {
        let snapshot = serde_json::to_value(snapshot)?;
        Ok(Self::new(Operation::UpdateStorage, vec![snapshot]))
    }

    /// Check whether a raw payload carries the protocol tag.
    ///
    /// Only the tag is inspected; the rest of the body may still be malformed.
    pub fn is_tagged(data: &Value) -> bool {
        data.get("tag").and_then(Value::as_str) == Some(API_TAG)
    }

    /// Decode a raw payload into an envelope
    pub fn from_value(data: Value) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_value(data)?;
        if envelope.tag != API_TAG {
            return Err(ProtocolError::TagMismatch);
        }
        Ok(envelope)
    }

    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Resolve the operation name
    pub fn operation(&self) -> Result<Operation, ProtocolError> {
        self.operation.parse()
    }

    /// Positional argument as a key
    pub fn key_arg(&self, position: usize) -> Result<&str, ProtocolError> {
        self.arguments
            .get(position)
            .and_then(Value::as_str)
            .ok_or_else(|| self.bad_arguments(format!("expected a string key at position {}", position)))
    }

    /// Positional argument as a value. A missing argument reads as `null`.
    pub fn value_arg(&self, position: usize) -> Value {
        self.arguments.get(position).cloned().unwrap_or(Value::Null)
    }

    /// Positional argument as a snapshot
    pub fn snapshot_arg(&self, position: usize) -> Result<Snapshot, ProtocolError> {
        let raw = self
            .arguments
            .get(position)
            .ok_or_else(|| self.bad_arguments(format!("missing snapshot at position {}", position)))?;
        serde_json::from_value(raw.clone())
            .map_err(|e| self.bad_arguments(format!("invalid snapshot: {}", e)))
    }

    fn bad_arguments(&self, reason: String) -> ProtocolError {
        ProtocolError::BadArguments {
            operation: self.operation.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Entry;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::set_item("a", json!(1));
        let value = envelope.to_value().unwrap();

        assert_eq!(
            value,
            json!({ "tag": API_TAG, "operation": "setItem", "arguments": ["a", 1] })
        );
    }

    #[test]
    fn test_is_tagged() {
        assert!(Envelope::is_tagged(&Envelope::request_update().to_value().unwrap()));
        assert!(!Envelope::is_tagged(&json!({ "tag": "someone-else" })));
        assert!(!Envelope::is_tagged(&json!("just a string")));
        assert!(!Envelope::is_tagged(&json!({ "operation": "setItem" })));
    }

    #[test]
    fn test_request_update_without_arguments_field() {
        let envelope =
            Envelope::from_value(json!({ "tag": API_TAG, "operation": "requestUpdate" })).unwrap();

        assert_eq!(envelope.operation().unwrap(), Operation::RequestUpdate);
        assert!(envelope.arguments.is_empty());
    }

    #[test]
    fn test_from_value_rejects_foreign_tag() {
        let result = Envelope::from_value(json!({
            "tag": "other",
            "operation": "setItem",
            "arguments": []
        }));
        assert!(matches!(result, Err(ProtocolError::TagMismatch)));
    }

    #[test]
    fn test_unknown_operation() {
        let envelope = Envelope {
            tag: API_TAG.to_string(),
            operation: "frobnicate".to_string(),
            arguments: vec![],
        };

        match envelope.operation() {
            Err(ProtocolError::UnknownOperation(name)) => assert_eq!(name, "frobnicate"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_key_arg_type_mismatch() {
        let envelope = Envelope::new(Operation::SetItem, vec![json!(42), json!("v")]);
        assert!(matches!(
            envelope.key_arg(0),
            Err(ProtocolError::BadArguments { .. })
        ));
    }

    #[test]
    fn test_value_arg_defaults_to_null() {
        let envelope = Envelope::remove_item("gone");
        assert_eq!(envelope.value_arg(1), Value::Null);
    }

    #[test]
    fn test_snapshot_arg_keeps_vacant_slots() {
        let snapshot = Snapshot::from_slots(vec![
            None,
            Some(Entry::new("b", json!(true))),
        ]);
        let envelope = Envelope::update_storage(&snapshot).unwrap();

        assert_eq!(envelope.arguments[0], json!([null, { "key": "b", "value": true }]));
        assert_eq!(envelope.snapshot_arg(0).unwrap(), snapshot);
    }
}
