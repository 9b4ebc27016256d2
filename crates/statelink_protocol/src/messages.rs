//! Protocol messages exchanged between primary and replicas.

use crate::edit::Edit;
use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminant of an incremental update.
pub const PATCH_STATE: &str = "PATCH_STATE";
/// Discriminant of a full-sync request or snapshot.
pub const SYNC_GLOBAL: &str = "SYNC_GLOBAL";
/// Discriminant of a replica-originated action.
pub const DISPATCH_ACTION: &str = "DISPATCH_ACTION";

/// Every accepted `type` value.
pub const MESSAGE_TYPES: [&str; 3] = [PATCH_STATE, SYNC_GLOBAL, DISPATCH_ACTION];

/// A sync protocol message.
///
/// On the wire every message is a JSON object with a `type` discriminant:
///
/// ```text
/// { "type": "PATCH_STATE",     "patches": [{op, path, value?}, ...] }
/// { "type": "SYNC_GLOBAL",     "state": <tree> }
/// { "type": "DISPATCH_ACTION", "action": <action> }
/// ```
///
/// A `SYNC_GLOBAL` without `state` is a full-sync request; with `state` it is
/// the snapshot answering one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    /// Incremental edits against the previous primary state.
    #[serde(rename = "PATCH_STATE")]
    PatchState {
        /// Ordered edit list.
        patches: Vec<Edit>,
    },
    /// Full-sync request (no state) or snapshot (with state).
    #[serde(rename = "SYNC_GLOBAL")]
    SyncGlobal {
        /// The complete primary tree, when this is a snapshot.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<Value>,
    },
    /// An action to run on the primary.
    #[serde(rename = "DISPATCH_ACTION")]
    DispatchAction {
        /// Opaque action value.
        #[serde(default)]
        action: Value,
    },
}

impl SyncMessage {
    /// Creates a patch message.
    pub fn patch(patches: Vec<Edit>) -> Self {
        SyncMessage::PatchState { patches }
    }

    /// Creates a full-sync request.
    pub fn sync_request() -> Self {
        SyncMessage::SyncGlobal { state: None }
    }

    /// Creates a snapshot carrying the whole tree.
    pub fn snapshot(state: Value) -> Self {
        SyncMessage::SyncGlobal { state: Some(state) }
    }

    /// Creates a dispatch message.
    pub fn dispatch(action: Value) -> Self {
        SyncMessage::DispatchAction { action }
    }

    /// Returns the wire discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::PatchState { .. } => PATCH_STATE,
            SyncMessage::SyncGlobal { .. } => SYNC_GLOBAL,
            SyncMessage::DispatchAction { .. } => DISPATCH_ACTION,
        }
    }

    /// Returns true for a `SYNC_GLOBAL` without state.
    pub fn is_sync_request(&self) -> bool {
        matches!(self, SyncMessage::SyncGlobal { state: None })
    }

    /// Validates an arbitrary value as a message.
    ///
    /// This is the single entry point for inbound traffic: anything whose
    /// `type` is not one of [`MESSAGE_TYPES`], or whose fields do not match
    /// that shape, is rejected.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        if !is_sync_message(&value) {
            return Err(ProtocolError::InvalidMessage(
                "missing or unrecognized `type`".into(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Decodes a message from JSON text.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Encodes to JSON text.
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Converts to a JSON value.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Returns true if `value` carries a recognized `type` discriminant.
pub fn is_sync_message(value: &Value) -> bool {
    value
        .get("type")
        .and_then(Value::as_str)
        .map(|kind| MESSAGE_TYPES.contains(&kind))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_message_wire_shape() {
        let message = SyncMessage::patch(vec![Edit::replace(vec!["count".into()], json!(1))]);
        assert_eq!(
            message.to_value().unwrap(),
            json!({
                "type": "PATCH_STATE",
                "patches": [{"op": "replace", "path": ["count"], "value": 1}]
            })
        );
    }

    #[test]
    fn sync_request_has_no_state() {
        let message = SyncMessage::sync_request();
        assert!(message.is_sync_request());
        assert_eq!(message.to_value().unwrap(), json!({"type": "SYNC_GLOBAL"}));

        let snapshot = SyncMessage::snapshot(json!({"a": 1}));
        assert!(!snapshot.is_sync_request());
        assert_eq!(
            snapshot.to_value().unwrap(),
            json!({"type": "SYNC_GLOBAL", "state": {"a": 1}})
        );
    }

    #[test]
    fn decode_each_shape() {
        let message = SyncMessage::decode(r#"{"type":"SYNC_GLOBAL","state":{"x":[1,2]}}"#).unwrap();
        assert_eq!(message, SyncMessage::snapshot(json!({"x": [1, 2]})));

        let message =
            SyncMessage::decode(r#"{"type":"DISPATCH_ACTION","action":{"type":"inc"}}"#).unwrap();
        assert_eq!(message.kind(), DISPATCH_ACTION);

        let message = SyncMessage::decode(r#"{"type":"SYNC_GLOBAL"}"#).unwrap();
        assert!(message.is_sync_request());
    }

    #[test]
    fn unrecognized_values_are_rejected() {
        for value in [
            json!({"type": "SYNCO_TEST_MESSAGE"}),
            json!({"patches": []}),
            json!({"type": 7}),
            json!("PATCH_STATE"),
            json!(null),
        ] {
            assert!(!is_sync_message(&value));
            assert!(matches!(
                SyncMessage::from_value(value),
                Err(ProtocolError::InvalidMessage(_))
            ));
        }
    }

    #[test]
    fn malformed_fields_are_rejected() {
        let value = json!({"type": "PATCH_STATE", "patches": "nope"});
        assert!(is_sync_message(&value));
        assert!(matches!(
            SyncMessage::from_value(value),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn encode_decode_preserves_message() {
        let message = SyncMessage::dispatch(json!({"type": "todos/add", "payload": "milk"}));
        let text = message.encode().unwrap();
        assert_eq!(SyncMessage::decode(&text).unwrap(), message);
    }
}
