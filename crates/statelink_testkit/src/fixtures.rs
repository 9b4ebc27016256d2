//! Test fixtures: reducers and store helpers.

use serde_json::{json, Map, Value};
use statelink_primary::{PrimaryConfig, PrimaryStore};
use statelink_protocol::SYNC_KEY;
use statelink_store::{Action, Store};
use std::sync::Arc;

/// Reducer function type used by the fixtures.
pub type FixtureReducer = fn(&Value, &Action) -> Option<Value>;

/// A primary store built from a fixture reducer.
pub type TestPrimary = PrimaryStore<Store<FixtureReducer>>;

/// Counter reducer.
///
/// Understands `counter/increment`, `counter/decrement` and `counter/set`
/// (payload is the new value). The tree is `{"counter": {"value": n}}`.
pub fn counter_reducer(state: &Value, action: &Action) -> Option<Value> {
    let value = state["counter"]["value"].as_i64().unwrap_or(0);
    let next = match action.kind.as_str() {
        "counter/increment" => value + 1,
        "counter/decrement" => value - 1,
        "counter/set" => action.payload().as_i64()?,
        _ => return None,
    };
    let mut state = state.clone();
    state["counter"] = json!({"value": next});
    Some(state)
}

/// Initial tree for [`counter_reducer`].
pub fn counter_state() -> Value {
    json!({"counter": {"value": 0}})
}

/// Todo list reducer.
///
/// Understands `todos/add` (payload is the text), `todos/toggle` and
/// `todos/remove` (payload is the index) and `todos/clear`.
pub fn todo_reducer(state: &Value, action: &Action) -> Option<Value> {
    let mut items = state["todos"].as_array().cloned().unwrap_or_default();
    match action.kind.as_str() {
        "todos/add" => {
            let text = action.payload().as_str()?;
            items.push(json!({"text": text, "done": false}));
        }
        "todos/toggle" => {
            let index = usize::try_from(action.payload().as_u64()?).ok()?;
            let item = items.get_mut(index)?;
            let done = item["done"].as_bool().unwrap_or(false);
            item["done"] = Value::Bool(!done);
        }
        "todos/remove" => {
            let index = usize::try_from(action.payload().as_u64()?).ok()?;
            if index >= items.len() {
                return None;
            }
            items.remove(index);
        }
        "todos/clear" => items.clear(),
        _ => return None,
    }
    let mut state = state.clone();
    state["todos"] = Value::Array(items);
    Some(state)
}

/// Reducer for fixtures that set arbitrary paths.
///
/// `tree/set` replaces the whole tree with the payload, which must be an
/// object. `tree/merge` inserts every key of the payload object.
pub fn tree_reducer(state: &Value, action: &Action) -> Option<Value> {
    match action.kind.as_str() {
        "tree/set" => action.payload().is_object().then(|| action.payload().clone()),
        "tree/merge" => {
            let patch = action.payload().as_object()?;
            let mut next = state.as_object().cloned().unwrap_or_default();
            for (key, value) in patch {
                next.insert(key.clone(), value.clone());
            }
            Some(Value::Object(next))
        }
        _ => None,
    }
}

/// Builds a primary store around `reducer`.
pub fn primary_store(reducer: FixtureReducer, initial: Value) -> Arc<TestPrimary> {
    Arc::new(PrimaryStore::new(
        Store::new(reducer, initial),
        PrimaryConfig::default(),
    ))
}

/// A primary running [`counter_reducer`].
pub fn counter_primary() -> Arc<TestPrimary> {
    primary_store(counter_reducer, counter_state())
}

/// A primary running [`tree_reducer`].
pub fn tree_primary(initial: Value) -> Arc<TestPrimary> {
    primary_store(tree_reducer, initial)
}

/// Returns a replica tree without its sync marker.
pub fn without_marker(tree: &Value) -> Value {
    match tree.as_object() {
        Some(map) => {
            let map: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| key.as_str() != SYNC_KEY)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(map)
        }
        None => tree.clone(),
    }
}
