//! Actions flowing through a state container.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A `{type, payload?}` action.
///
/// Fields other than `type` and `payload` are kept in `extra` so that an
/// action forwarded from a replica reaches the primary unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action type, e.g. `"todos/add"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Action payload. `None` when the action has no `payload` key; an
    /// explicit `null` is kept as `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "present_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Value>,
    /// Any other fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Action {
    /// Creates an action with no payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            extra: Map::new(),
        }
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// The payload, or `null` when absent.
    pub fn payload(&self) -> &Value {
        static NULL: Value = Value::Null;
        self.payload.as_ref().unwrap_or(&NULL)
    }

    /// Parses an opaque value as an action.
    ///
    /// Returns `None` unless `value` is an object with a string `type`.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// Converts to a JSON value.
    pub fn to_value(&self) -> Value {
        // An Action is always representable as JSON.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn present_payload<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape() {
        let action = Action::new("counter/add").with_payload(json!(5));
        assert_eq!(action.to_value(), json!({"type": "counter/add", "payload": 5}));
        assert_eq!(Action::new("reset").to_value(), json!({"type": "reset"}));
    }

    #[test]
    fn extra_fields_survive() {
        let value = json!({"type": "x", "meta": {"source": "popup"}});
        let action = Action::from_value(value.clone()).unwrap();
        assert_eq!(action.extra["meta"], json!({"source": "popup"}));
        assert_eq!(action.to_value(), value);
    }

    #[test]
    fn explicit_null_payload_is_kept() {
        let value = json!({"type": "x", "payload": null});
        let action = Action::from_value(value.clone()).unwrap();
        assert_eq!(action.payload, Some(Value::Null));
        assert_eq!(action.to_value(), value);

        let bare = Action::from_value(json!({"type": "x"})).unwrap();
        assert_eq!(bare.payload, None);
        assert_eq!(bare.payload(), &Value::Null);
    }

    #[test]
    fn non_actions_are_rejected() {
        assert!(Action::from_value(json!(null)).is_none());
        assert!(Action::from_value(json!({"payload": 1})).is_none());
        assert!(Action::from_value(json!({"type": 3})).is_none());
    }
}
