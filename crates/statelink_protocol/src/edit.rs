//! Edit records produced by the diff engine.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of structural change an edit performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOp {
    /// Overwrite the value at the path.
    Replace,
    /// Insert a key that did not exist before.
    Add,
    /// Delete the key (or array element) at the path.
    Remove,
    /// An op introduced by a newer diff engine. Skipped on apply.
    #[serde(other)]
    Unknown,
}

impl EditOp {
    /// Returns true if edits of this kind carry a value.
    pub fn carries_value(&self) -> bool {
        matches!(self, EditOp::Replace | EditOp::Add)
    }
}

/// One component of an edit path.
///
/// Integers index ordered sequences, strings index mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array index.
    Index(usize),
    /// Object key.
    Key(String),
}

impl PathSegment {
    /// The segment as an object key.
    ///
    /// Indices are stringified, matching how a JSON object would be indexed by
    /// a number.
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Index(i) => i.to_string(),
            PathSegment::Key(k) => k.clone(),
        }
    }

    /// The segment as an array index, if it is one (or a numeric key).
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(k) => k.parse().ok(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Key(k) => write!(f, "{}", k),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single `{op, path, value?}` instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    /// What to do at `path`.
    pub op: EditOp,
    /// Location inside the tree. Empty means the root.
    pub path: Vec<PathSegment>,
    /// New value for `Replace` / `Add`; absent for `Remove`.
    ///
    /// A present `null` decodes to `Some(Value::Null)`, so it survives a
    /// decode/encode relay.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Edit {
    /// Creates a replace edit.
    pub fn replace(path: Vec<PathSegment>, value: Value) -> Self {
        Self {
            op: EditOp::Replace,
            path,
            value: Some(value),
        }
    }

    /// Creates an add edit.
    pub fn add(path: Vec<PathSegment>, value: Value) -> Self {
        Self {
            op: EditOp::Add,
            path,
            value: Some(value),
        }
    }

    /// Creates a remove edit.
    pub fn remove(path: Vec<PathSegment>) -> Self {
        Self {
            op: EditOp::Remove,
            path,
            value: None,
        }
    }

    /// Renders the path as `a/b/0`, for logs.
    pub fn path_display(&self) -> String {
        self.path
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}
