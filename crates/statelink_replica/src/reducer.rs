//! Reducer for replica stores.
//!
//! A replica's tree is only ever changed by the two internal actions below;
//! everything else a replica dispatches is forwarded to the primary.

use serde_json::Value;
use statelink_protocol::{apply, apply_snapshot, is_replica_tree, set_synced, Edit, SYNC_KEY};
use statelink_store::{Action, Reducer};
use tracing::warn;

/// Applies an edit batch to the replica tree.
pub const APPLY_PATCH_ACTION: &str = "statelink/applyPatch";

/// Replaces the replica tree with a snapshot.
pub const SYNC_GLOBAL_ACTION: &str = "statelink/syncGlobal";

/// Builds an apply-patch action.
pub fn apply_patch_action(edits: &[Edit]) -> Action {
    let payload = serde_json::to_value(edits).unwrap_or(Value::Null);
    Action::new(APPLY_PATCH_ACTION).with_payload(payload)
}

/// Builds a snapshot action.
pub fn sync_global_action(state: Value) -> Action {
    Action::new(SYNC_GLOBAL_ACTION).with_payload(state)
}

/// Returns true for actions handled locally by [`ReplicaReducer`].
pub fn is_internal_action(action: &Action) -> bool {
    action.kind == APPLY_PATCH_ACTION || action.kind == SYNC_GLOBAL_ACTION
}

/// The reducer of a replica store.
///
/// A patch batch that cannot be applied leaves the tree as it was except for
/// the sync marker, which drops to `false` so the session asks for a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicaReducer;

impl ReplicaReducer {
    fn reduce_patch(&self, state: &Value, payload: &Value) -> Option<Value> {
        let edits: Vec<Edit> = match serde_json::from_value(payload.clone()) {
            Ok(edits) => edits,
            Err(e) => {
                warn!(error = %e, "malformed patch payload");
                return None;
            }
        };

        match apply(state, &edits) {
            Ok(mut next) => {
                // A root-level replace must not drop the marker.
                if is_replica_tree(state) && !is_replica_tree(&next) && next.is_object() {
                    let marker = state.get(SYNC_KEY).cloned().unwrap_or(Value::Bool(false));
                    if let Some(map) = next.as_object_mut() {
                        map.insert(SYNC_KEY.to_string(), marker);
                    }
                }
                Some(next)
            }
            Err(e) => {
                warn!(error = %e, edits = edits.len(), "patch batch rejected, marking unsynced");
                let mut next = state.clone();
                set_synced(&mut next, false).ok()?;
                Some(next)
            }
        }
    }
}

impl Reducer for ReplicaReducer {
    fn reduce(&self, state: &Value, action: &Action) -> Option<Value> {
        match action.kind.as_str() {
            APPLY_PATCH_ACTION => self.reduce_patch(state, action.payload()),
            SYNC_GLOBAL_ACTION => match apply_snapshot(action.payload().clone()) {
                Ok(next) => Some(next),
                Err(e) => {
                    warn!(error = %e, "snapshot rejected");
                    None
                }
            },
            _ => None,
        }
    }
}
