//! Property-based test generators using proptest.
//!
//! Trees are JSON objects at the root, never contain the replica sync marker,
//! and contain only finite numbers.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for object keys. Never collides with the sync marker key.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("Invalid regex")
}

/// Strategy for scalar values.
pub fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9f64).prop_map(Value::from),
        prop::string::string_regex("[ -~]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for arbitrary nested values.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

/// Strategy for state trees (object at the root).
pub fn state_tree_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key_strategy(), json_value_strategy(), 0..8)
        .prop_map(|map| Value::Object(map.into_iter().collect()))
}

/// Strategy for a tree and a plausible successor of it.
///
/// Unrelated random trees share almost no structure; this keeps some keys,
/// drops some, replaces some and recurses into nested objects, which is what
/// successive states of a real store look like.
pub fn evolved_tree_strategy() -> impl Strategy<Value = (Value, Value)> {
    (
        state_tree_strategy(),
        state_tree_strategy(),
        prop::collection::vec(0u8..4, 1..16),
    )
        .prop_map(|(old, extra, choices)| {
            let new = evolve(&old, &extra, &choices, 0);
            (old, new)
        })
}

fn evolve(old: &Value, extra: &Value, choices: &[u8], depth: usize) -> Value {
    let (Some(old_map), Some(extra_map)) = (old.as_object(), extra.as_object()) else {
        return extra.clone();
    };

    let replacements: Vec<&Value> = extra_map.values().collect();
    let mut next = Map::new();
    for (i, (key, value)) in old_map.iter().enumerate() {
        let choice = choices[(i + depth) % choices.len()];
        match choice {
            0 => {
                next.insert(key.clone(), value.clone());
            }
            1 => {}
            2 => {
                let replacement = replacements
                    .get(i % replacements.len().max(1))
                    .map(|v| (*v).clone())
                    .unwrap_or(Value::Null);
                next.insert(key.clone(), replacement);
            }
            _ if value.is_object() => {
                next.insert(key.clone(), evolve(value, extra, choices, depth + 1));
            }
            _ => {
                next.insert(key.clone(), value.clone());
            }
        }
    }

    if depth == 0 {
        for (i, (key, value)) in extra_map.iter().enumerate() {
            if i % 2 == 0 && !next.contains_key(key) {
                next.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(next)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
