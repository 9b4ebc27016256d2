//! The synchronization marker carried by replica trees.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::{json, Value};

/// Well-known key whose presence identifies a replica tree.
///
/// Its boolean value says whether the tree reflects a confirmed snapshot.
pub const SYNC_KEY: &str = "isStateSynced";

/// The state a replica starts with before its first snapshot.
pub fn initial_replica_state() -> Value {
    json!({ SYNC_KEY: false })
}

/// Returns true if `tree` carries the sync marker.
pub fn is_replica_tree(tree: &Value) -> bool {
    tree.as_object()
        .map(|map| map.contains_key(SYNC_KEY))
        .unwrap_or(false)
}

/// Reads the sync marker.
///
/// Fails with [`ProtocolError::NotAReplica`] if `tree` has no marker; asking a
/// primary tree whether it is synced is a programming error.
pub fn is_synced(tree: &Value) -> ProtocolResult<bool> {
    let marker = tree
        .as_object()
        .and_then(|map| map.get(SYNC_KEY))
        .ok_or(ProtocolError::NotAReplica { key: SYNC_KEY })?;
    Ok(truthy(marker))
}

/// Sets the sync marker on an object tree.
pub fn set_synced(tree: &mut Value, synced: bool) -> ProtocolResult<()> {
    match tree.as_object_mut() {
        Some(map) => {
            map.insert(SYNC_KEY.to_string(), Value::Bool(synced));
            Ok(())
        }
        None => Err(ProtocolError::NotAReplica { key: SYNC_KEY }),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_unsynced_replica() {
        let tree = initial_replica_state();
        assert!(is_replica_tree(&tree));
        assert!(!is_synced(&tree).unwrap());
    }

    #[test]
    fn primary_tree_is_misuse() {
        let tree = json!({"count": 1});
        assert!(!is_replica_tree(&tree));
        assert!(matches!(
            is_synced(&tree),
            Err(ProtocolError::NotAReplica { .. })
        ));
        assert!(!is_replica_tree(&json!([SYNC_KEY])));
    }

    #[test]
    fn set_and_read_marker() {
        let mut tree = json!({"a": 1});
        set_synced(&mut tree, true).unwrap();
        assert!(is_synced(&tree).unwrap());
        set_synced(&mut tree, false).unwrap();
        assert!(!is_synced(&tree).unwrap());

        assert!(set_synced(&mut json!(3), true).is_err());
    }

    #[test]
    fn marker_truthiness() {
        assert!(is_synced(&json!({ SYNC_KEY: 1 })).unwrap());
        assert!(!is_synced(&json!({ SYNC_KEY: null })).unwrap());
        assert!(!is_synced(&json!({ SYNC_KEY: "" })).unwrap());
    }
}
