//! Property tests for the diff and patch engines.

use proptest::prelude::*;
use serde_json::Value;
use statelink_protocol::{
    apply, apply_snapshot, diff, is_synced, Edit, EditOp, PathSegment, SyncMessage, SYNC_KEY,
};
use statelink_testkit::{
    evolved_tree_strategy, json_value_strategy, state_tree_strategy, PropTestConfig,
};

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn diff_then_apply_reconstructs((old, new) in evolved_tree_strategy()) {
        let edits = diff(&old, &new);
        prop_assert_eq!(apply(&old, &edits).unwrap(), new);
    }

    #[test]
    fn unrelated_trees_reconstruct(old in state_tree_strategy(), new in state_tree_strategy()) {
        let edits = diff(&old, &new);
        prop_assert_eq!(apply(&old, &edits).unwrap(), new);
    }

    #[test]
    fn arbitrary_values_reconstruct(old in json_value_strategy(), new in json_value_strategy()) {
        let edits = diff(&old, &new);
        prop_assert_eq!(apply(&old, &edits).unwrap(), new);
    }

    #[test]
    fn equal_trees_produce_no_edits(tree in state_tree_strategy()) {
        prop_assert!(diff(&tree, &tree).is_empty());
        prop_assert!(diff(&tree, &tree.clone()).is_empty());
    }

    #[test]
    fn paths_never_descend_into_arrays((old, new) in evolved_tree_strategy()) {
        for edit in diff(&old, &new) {
            prop_assert!(edit.path.iter().all(|s| matches!(s, PathSegment::Key(_))));
            prop_assert_eq!(edit.value.is_some(), edit.op.carries_value());
            prop_assert_ne!(edit.op, EditOp::Unknown);
        }
    }

    #[test]
    fn patches_survive_the_wire((old, new) in evolved_tree_strategy()) {
        let message = SyncMessage::patch(diff(&old, &new));
        let text = message.encode().unwrap();
        let decoded = SyncMessage::decode(&text).unwrap();
        prop_assert_eq!(&decoded, &message);

        let SyncMessage::PatchState { patches } = decoded else {
            return Err(TestCaseError::fail("decoded to another kind"));
        };
        prop_assert_eq!(apply(&old, &patches).unwrap(), new);
    }

    #[test]
    fn snapshot_apply_is_idempotent(tree in state_tree_strategy()) {
        let once = apply_snapshot(tree.clone()).unwrap();
        let twice = apply_snapshot(once.clone()).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert!(is_synced(&once).unwrap());
        prop_assert_eq!(once.as_object().unwrap().len(), tree.as_object().unwrap().len() + 1);
    }

    #[test]
    fn failed_batch_leaves_input_untouched((old, new) in evolved_tree_strategy()) {
        let mut edits = diff(&old, &new);
        edits.push(Edit::replace(
            vec!["__missing__".into(), "child".into()],
            Value::Null,
        ));
        let before = old.clone();
        prop_assert!(apply(&old, &edits).is_err());
        prop_assert_eq!(old, before);
    }

    #[test]
    fn replica_marker_rides_through_patches((old, new) in evolved_tree_strategy()) {
        let replica = apply_snapshot(old.clone()).unwrap();
        let next = apply(&replica, &diff(&old, &new)).unwrap();
        prop_assert_eq!(next.get(SYNC_KEY), Some(&Value::Bool(true)));
    }
}
