//! Patch application engine.

use crate::edit::{Edit, EditOp, PathSegment};
use crate::error::{PatchError, ProtocolError, ProtocolResult};
use crate::marker::set_synced;
use serde_json::Value;

/// Applies `edits` in order and returns the resulting tree.
///
/// `tree` itself is never modified. Edits with an unknown op are skipped. A
/// batch is all-or-nothing: the first edit that cannot be resolved aborts the
/// batch with a [`PatchError`].
pub fn apply(tree: &Value, edits: &[Edit]) -> Result<Value, PatchError> {
    let mut working = tree.clone();
    for (index, edit) in edits.iter().enumerate() {
        apply_edit(&mut working, index, edit)?;
    }
    Ok(working)
}

/// Applies `edits` to `tree` in place.
///
/// On error `tree` keeps its previous content.
pub fn apply_in_place(tree: &mut Value, edits: &[Edit]) -> Result<(), PatchError> {
    *tree = apply(tree, edits)?;
    Ok(())
}

/// Builds the replica tree for a full snapshot.
///
/// The previous tree is discarded entirely; the result is `snapshot` plus the
/// sync marker set to `true`. Snapshots must be objects, since the marker has to
/// live somewhere.
pub fn apply_snapshot(snapshot: Value) -> ProtocolResult<Value> {
    let mut tree = match snapshot {
        Value::Object(_) => snapshot,
        other => {
            return Err(ProtocolError::InvalidMessage(format!(
                "snapshot must be an object, got {}",
                kind_name(&other)
            )))
        }
    };
    set_synced(&mut tree, true)?;
    Ok(tree)
}

fn apply_edit(root: &mut Value, index: usize, edit: &Edit) -> Result<(), PatchError> {
    if edit.op == EditOp::Unknown {
        return Ok(());
    }

    let Some((last, parents)) = edit.path.split_last() else {
        return match edit.op {
            EditOp::Replace | EditOp::Add => {
                *root = edit.value.clone().unwrap_or(Value::Null);
                Ok(())
            }
            EditOp::Remove => Err(PatchError::RemoveRoot { edit: index }),
            EditOp::Unknown => Ok(()),
        };
    };

    let target = descend(root, parents, index)?;

    match edit.op {
        EditOp::Replace | EditOp::Add => {
            let value = edit.value.clone().unwrap_or(Value::Null);
            set_child(target, last, value, index, parents)
        }
        EditOp::Remove => remove_child(target, last, index, parents),
        EditOp::Unknown => Ok(()),
    }
}

fn descend<'a>(
    root: &'a mut Value,
    parents: &[PathSegment],
    edit: usize,
) -> Result<&'a mut Value, PatchError> {
    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        current = match current {
            Value::Object(map) => {
                map.get_mut(&segment.as_key())
                    .ok_or_else(|| PatchError::PathNotFound {
                        edit,
                        path: render(&parents[..=depth]),
                    })?
            }
            Value::Array(items) => {
                let len = items.len();
                let position = segment.as_index().ok_or_else(|| PatchError::PathNotFound {
                    edit,
                    path: render(&parents[..=depth]),
                })?;
                items
                    .get_mut(position)
                    .ok_or(PatchError::IndexOutOfBounds {
                        edit,
                        index: position,
                        len,
                    })?
            }
            _ => {
                return Err(PatchError::NotAContainer {
                    edit,
                    path: render(&parents[..depth]),
                })
            }
        };
    }
    Ok(current)
}

fn set_child(
    target: &mut Value,
    key: &PathSegment,
    value: Value,
    edit: usize,
    parents: &[PathSegment],
) -> Result<(), PatchError> {
    match target {
        Value::Object(map) => {
            map.insert(key.as_key(), value);
            Ok(())
        }
        Value::Array(items) => {
            let len = items.len();
            let position = key.as_index().ok_or_else(|| PatchError::PathNotFound {
                edit,
                path: format!("{}/{}", render(parents), key),
            })?;
            if position < len {
                items[position] = value;
            } else if position == len {
                items.push(value);
            } else {
                return Err(PatchError::IndexOutOfBounds {
                    edit,
                    index: position,
                    len,
                });
            }
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            edit,
            path: render(parents),
        }),
    }
}

fn remove_child(
    target: &mut Value,
    key: &PathSegment,
    edit: usize,
    parents: &[PathSegment],
) -> Result<(), PatchError> {
    match target {
        Value::Object(map) => {
            // Removing an absent key is a no-op.
            map.shift_remove(&key.as_key());
            Ok(())
        }
        Value::Array(items) => {
            // Later elements shift down by one.
            if let Some(position) = key.as_index() {
                if position < items.len() {
                    items.remove(position);
                }
            }
            Ok(())
        }
        _ => Err(PatchError::NotAContainer {
            edit,
            path: render(parents),
        }),
    }
}

fn render(path: &[PathSegment]) -> String {
    path.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::marker::SYNC_KEY;
    use serde_json::json;

    #[test]
    fn replace_and_add() {
        let tree = json!({"count": 0});
        let edits = vec![
            Edit::replace(vec!["count".into()], json!(1)),
            Edit::add(vec!["label".into()], json!("one")),
        ];
        let next = apply(&tree, &edits).unwrap();
        assert_eq!(next, json!({"count": 1, "label": "one"}));
        // input untouched
        assert_eq!(tree, json!({"count": 0}));
    }

    #[test]
    fn remove_from_object_and_array() {
        let tree = json!({"a": 1, "b": 2, "list": [10, 20, 30]});
        let edits = vec![
            Edit::remove(vec!["a".into()]),
            Edit::remove(vec!["list".into(), 0.into()]),
        ];
        let next = apply(&tree, &edits).unwrap();
        assert_eq!(next, json!({"b": 2, "list": [20, 30]}));
    }

    #[test]
    fn array_remove_shifts_later_indices() {
        let tree = json!({"list": ["a", "b", "c"]});
        // Two removes at index 0 drop the first two elements.
        let edits = vec![
            Edit::remove(vec!["list".into(), 0.into()]),
            Edit::remove(vec!["list".into(), 0.into()]),
        ];
        assert_eq!(apply(&tree, &edits).unwrap(), json!({"list": ["c"]}));
    }

    #[test]
    fn later_edits_see_earlier_ones() {
        let tree = json!({});
        let edits = vec![
            Edit::add(vec!["user".into()], json!({})),
            Edit::add(vec!["user".into(), "name".into()], json!("ada")),
        ];
        assert_eq!(
            apply(&tree, &edits).unwrap(),
            json!({"user": {"name": "ada"}})
        );
    }

    #[test]
    fn unknown_ops_are_skipped() {
        let tree = json!({"a": 1});
        let edits = vec![
            Edit {
                op: EditOp::Unknown,
                path: vec!["a".into()],
                value: Some(json!(99)),
            },
            Edit::replace(vec!["b".into()], json!(2)),
        ];
        assert_eq!(apply(&tree, &edits).unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn missing_intermediate_aborts_batch() {
        let mut tree = json!({"a": {"x": 1}});
        let edits = vec![
            Edit::replace(vec!["a".into(), "x".into()], json!(2)),
            Edit::replace(vec!["gone".into(), "y".into()], json!(3)),
        ];
        let err = apply_in_place(&mut tree, &edits).unwrap_err();
        assert_eq!(
            err,
            PatchError::PathNotFound {
                edit: 1,
                path: "gone".into()
            }
        );
        // first edit was not kept
        assert_eq!(tree, json!({"a": {"x": 1}}));
    }

    #[test]
    fn scalar_intermediate_is_rejected() {
        let tree = json!({"a": 5});
        let edits = vec![Edit::replace(vec!["a".into(), "b".into()], json!(1))];
        assert!(matches!(
            apply(&tree, &edits),
            Err(PatchError::NotAContainer { edit: 0, .. })
        ));
    }

    #[test]
    fn array_set_bounds() {
        let tree = json!({"list": [1]});
        let append = vec![Edit::add(vec!["list".into(), 1.into()], json!(2))];
        assert_eq!(apply(&tree, &append).unwrap(), json!({"list": [1, 2]}));

        let gap = vec![Edit::add(vec!["list".into(), 5.into()], json!(2))];
        assert!(matches!(
            apply(&tree, &gap),
            Err(PatchError::IndexOutOfBounds { index: 5, len: 1, .. })
        ));
    }

    #[test]
    fn root_edits() {
        let replaced = apply(&json!(1), &[Edit::replace(vec![], json!({"a": 1}))]).unwrap();
        assert_eq!(replaced, json!({"a": 1}));

        let err = apply(&json!({}), &[Edit::remove(vec![])]).unwrap_err();
        assert_eq!(err, PatchError::RemoveRoot { edit: 0 });
    }

    #[test]
    fn null_value_round_trips() {
        let old = json!({"a": 1});
        let new = json!({"a": null, "b": null});
        assert_eq!(apply(&old, &diff(&old, &new)).unwrap(), new);
    }

    #[test]
    fn snapshot_replaces_everything() {
        let next = apply_snapshot(json!({"count": 3})).unwrap();
        assert_eq!(next, json!({"count": 3, SYNC_KEY: true}));

        let again = apply_snapshot(json!({"count": 3})).unwrap();
        assert_eq!(next, again);
    }

    #[test]
    fn snapshot_must_be_object() {
        assert!(matches!(
            apply_snapshot(json!([1, 2])),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }
}
