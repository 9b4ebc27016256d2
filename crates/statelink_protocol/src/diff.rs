//! Diff engine: before/after state pair to an ordered edit list.

use crate::edit::{Edit, PathSegment};
use serde_json::{Map, Value};

/// Computes the edits that turn `old` into `new`.
///
/// Arrays are atomic: any difference in length or content yields one
/// `Replace` of the whole array at its path. Objects are compared key by key
/// and, at each level, emit removes first, then adds, then the nested edits of
/// keys present on both sides. Anything else (scalars, or a type change such as
/// object to array) yields a `Replace` when the values differ.
///
/// Equal subtrees produce nothing, so `diff(a, a)` is empty.
pub fn diff(old: &Value, new: &Value) -> Vec<Edit> {
    let mut edits = Vec::new();
    let mut path = Vec::new();
    diff_at(&mut edits, &mut path, old, new);
    edits
}

fn diff_at(edits: &mut Vec<Edit>, path: &mut Vec<PathSegment>, old: &Value, new: &Value) {
    match (old, new) {
        (Value::Array(_), Value::Array(_)) => {
            if old != new {
                edits.push(Edit::replace(path.clone(), new.clone()));
            }
        }
        (Value::Object(old_map), Value::Object(new_map)) => {
            diff_objects(edits, path, old_map, new_map);
        }
        _ => {
            if old != new {
                edits.push(Edit::replace(path.clone(), new.clone()));
            }
        }
    }
}

fn diff_objects(
    edits: &mut Vec<Edit>,
    path: &mut Vec<PathSegment>,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
) {
    for key in old.keys() {
        if !new.contains_key(key) {
            edits.push(Edit::remove(child_path(path, key)));
        }
    }

    let mut changed = Vec::new();
    for (key, value) in new {
        match old.get(key) {
            None => edits.push(Edit::add(child_path(path, key), value.clone())),
            Some(prev) if prev != value => changed.push((key, prev, value)),
            Some(_) => {}
        }
    }

    for (key, prev, value) in changed {
        path.push(PathSegment::Key(key.clone()));
        diff_at(edits, path, prev, value);
        path.pop();
    }
}

fn child_path(path: &[PathSegment], key: &str) -> Vec<PathSegment> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(PathSegment::Key(key.to_string()));
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::EditOp;
    use serde_json::json;

    #[test]
    fn identical_trees_produce_nothing() {
        let tree = json!({
            "user": {"name": "ada", "tags": ["a", "b"], "meta": {"n": 1}},
            "items": [{"id": 1}, {"id": 2}],
            "flag": true,
        });
        assert!(diff(&tree, &tree.clone()).is_empty());
    }

    #[test]
    fn scalar_change_is_a_replace() {
        let edits = diff(&json!({"count": 0}), &json!({"count": 1}));
        assert_eq!(edits, vec![Edit::replace(vec!["count".into()], json!(1))]);
    }

    #[test]
    fn added_key() {
        let edits = diff(
            &json!({"count": 1}),
            &json!({"count": 1, "newKey": "added"}),
        );
        assert_eq!(
            edits,
            vec![Edit::add(vec!["newKey".into()], json!("added"))]
        );
    }

    #[test]
    fn removed_key() {
        let edits = diff(&json!({"count": 1, "toBeRemoved": "x"}), &json!({"count": 1}));
        assert_eq!(edits, vec![Edit::remove(vec!["toBeRemoved".into()])]);
        assert!(edits[0].value.is_none());
    }

    #[test]
    fn arrays_are_replaced_whole() {
        let edits = diff(
            &json!({"items": ["a", "b", "c"]}),
            &json!({"items": ["a", "x", "c"]}),
        );
        assert_eq!(
            edits,
            vec![Edit::replace(vec!["items".into()], json!(["a", "x", "c"]))]
        );

        let edits = diff(&json!({"items": [1, 2]}), &json!({"items": [1, 2, 3]}));
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].op, EditOp::Replace);
    }

    #[test]
    fn nested_changes_carry_full_path() {
        let edits = diff(
            &json!({"a": {"b": {"c": 1, "d": 2}}}),
            &json!({"a": {"b": {"c": 5, "d": 2}}}),
        );
        assert_eq!(
            edits,
            vec![Edit::replace(
                vec!["a".into(), "b".into(), "c".into()],
                json!(5)
            )]
        );
    }

    #[test]
    fn removes_then_adds_then_nested() {
        let old = json!({"nested": {"x": 1}, "gone": true, "same": 0});
        let new = json!({"nested": {"x": 2}, "fresh": "y", "same": 0});
        let ops: Vec<_> = diff(&old, &new).into_iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![EditOp::Remove, EditOp::Add, EditOp::Replace]);
    }

    #[test]
    fn type_change_replaces() {
        let edits = diff(&json!({"v": {"a": 1}}), &json!({"v": [1]}));
        assert_eq!(edits, vec![Edit::replace(vec!["v".into()], json!([1]))]);

        let edits = diff(&json!({"v": null}), &json!({"v": {}}));
        assert_eq!(edits, vec![Edit::replace(vec!["v".into()], json!({}))]);
    }

    #[test]
    fn root_scalar_replace_has_empty_path() {
        let edits = diff(&json!(1), &json!("one"));
        assert_eq!(edits, vec![Edit::replace(vec![], json!("one"))]);
    }
}
