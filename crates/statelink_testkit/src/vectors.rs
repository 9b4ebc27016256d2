//! Wire-compatibility test vectors.
//!
//! These vectors pin down the JSON shape of edits and messages so that a
//! replica or primary written against another runtime interoperates.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A diff vector: `diff(old, new)` must serialize to `edits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Tree before.
    pub old: Value,
    /// Tree after.
    pub new: Value,
    /// Expected edit list.
    pub edits: Value,
}

/// A wire vector: a raw message and whether it is a valid sync message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// The raw message.
    pub wire: Value,
    /// Expected `type` if valid, `None` if the message must be rejected.
    pub kind: Option<String>,
}

fn diff_vector(id: &str, description: &str, old: Value, new: Value, edits: Value) -> DiffVector {
    DiffVector {
        id: id.into(),
        description: description.into(),
        old,
        new,
        edits,
    }
}

fn wire_vector(id: &str, description: &str, wire: Value, kind: Option<&str>) -> WireVector {
    WireVector {
        id: id.into(),
        description: description.into(),
        wire,
        kind: kind.map(str::to_string),
    }
}

/// Diff engine vectors.
pub fn diff_vectors() -> Vec<DiffVector> {
    vec![
        diff_vector(
            "diff_equal",
            "Equal trees produce no edits",
            json!({"a": 1, "b": {"c": [1, 2]}}),
            json!({"a": 1, "b": {"c": [1, 2]}}),
            json!([]),
        ),
        diff_vector(
            "diff_scalar_replace",
            "Changed scalar under a nested key",
            json!({"a": {"b": 1}}),
            json!({"a": {"b": 2}}),
            json!([{"op": "replace", "path": ["a", "b"], "value": 2}]),
        ),
        diff_vector(
            "diff_add_remove",
            "Removes come before adds at the same level",
            json!({"gone": true, "kept": 1}),
            json!({"kept": 1, "fresh": "x"}),
            json!([
                {"op": "remove", "path": ["gone"]},
                {"op": "add", "path": ["fresh"], "value": "x"}
            ]),
        ),
        diff_vector(
            "diff_array_atomic",
            "Any array change replaces the whole array",
            json!({"list": [1, 2, 3]}),
            json!({"list": [1, 2, 4]}),
            json!([{"op": "replace", "path": ["list"], "value": [1, 2, 4]}]),
        ),
        diff_vector(
            "diff_type_change",
            "Object to array is a replace",
            json!({"v": {"k": 1}}),
            json!({"v": [1]}),
            json!([{"op": "replace", "path": ["v"], "value": [1]}]),
        ),
        diff_vector(
            "diff_null_value",
            "A key set to null is added with a null value",
            json!({}),
            json!({"n": null}),
            json!([{"op": "add", "path": ["n"], "value": null}]),
        ),
        diff_vector(
            "diff_nested_after_siblings",
            "Nested edits follow the removes and adds of their parent level",
            json!({"x": {"y": 1}, "old": 0}),
            json!({"x": {"y": 2}, "new": 0}),
            json!([
                {"op": "remove", "path": ["old"]},
                {"op": "add", "path": ["new"], "value": 0},
                {"op": "replace", "path": ["x", "y"], "value": 2}
            ]),
        ),
    ]
}

/// Message validation vectors.
pub fn wire_vectors() -> Vec<WireVector> {
    vec![
        wire_vector(
            "wire_sync_request",
            "Full-sync request has no state",
            json!({"type": "SYNC_GLOBAL"}),
            Some("SYNC_GLOBAL"),
        ),
        wire_vector(
            "wire_snapshot",
            "Snapshot carries the tree",
            json!({"type": "SYNC_GLOBAL", "state": {"count": 1}}),
            Some("SYNC_GLOBAL"),
        ),
        wire_vector(
            "wire_patch",
            "Patch message with one edit",
            json!({"type": "PATCH_STATE", "patches": [{"op": "remove", "path": ["a", 0]}]}),
            Some("PATCH_STATE"),
        ),
        wire_vector(
            "wire_dispatch",
            "Forwarded action",
            json!({"type": "DISPATCH_ACTION", "action": {"type": "todos/add", "payload": "x"}}),
            Some("DISPATCH_ACTION"),
        ),
        wire_vector(
            "wire_unknown_type",
            "Unknown discriminant is rejected",
            json!({"type": "HELLO"}),
            None,
        ),
        wire_vector(
            "wire_missing_type",
            "Missing discriminant is rejected",
            json!({"state": {}}),
            None,
        ),
        wire_vector(
            "wire_not_object",
            "Non-object messages are rejected",
            json!(["SYNC_GLOBAL"]),
            None,
        ),
    ]
}

/// All vectors as pretty JSON for other implementations.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        diff: diff_vectors(),
        wire: wire_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    diff: Vec<DiffVector>,
    wire: Vec<WireVector>,
}
