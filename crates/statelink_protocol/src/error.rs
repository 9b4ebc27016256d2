//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding messages or inspecting trees.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON encoding or decoding failed.
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The value is not one of the three message shapes.
    #[error("not a sync message: {0}")]
    InvalidMessage(String),

    /// An edit batch could not be applied.
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    /// A replica-only predicate was used on a tree without the sync marker.
    #[error("tree is not a replica: missing `{key}` marker")]
    NotAReplica {
        /// The marker key that was expected.
        key: &'static str,
    },
}

/// Reasons an edit could not be applied.
///
/// A failing edit aborts its whole batch; the tree handed to `apply` is left
/// untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// An intermediate path segment does not exist.
    #[error("edit {edit}: path not found at `{path}`")]
    PathNotFound {
        /// Position of the edit in its batch.
        edit: usize,
        /// The path prefix that could not be resolved.
        path: String,
    },

    /// An array index is past the end of the array.
    #[error("edit {edit}: index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// Position of the edit in its batch.
        edit: usize,
        /// The offending index.
        index: usize,
        /// Array length at the time of the edit.
        len: usize,
    },

    /// A path segment addresses into a scalar.
    #[error("edit {edit}: `{path}` is not a container")]
    NotAContainer {
        /// Position of the edit in its batch.
        edit: usize,
        /// The path prefix that resolved to a scalar.
        path: String,
    },

    /// A remove edit with an empty path.
    #[error("edit {edit}: cannot remove the root")]
    RemoveRoot {
        /// Position of the edit in its batch.
        edit: usize,
    },
}

impl PatchError {
    /// Position of the failing edit in its batch.
    pub fn edit_index(&self) -> usize {
        match self {
            PatchError::PathNotFound { edit, .. }
            | PatchError::IndexOutOfBounds { edit, .. }
            | PatchError::NotAContainer { edit, .. }
            | PatchError::RemoveRoot { edit } => *edit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_error_display() {
        let err = PatchError::IndexOutOfBounds {
            edit: 2,
            index: 9,
            len: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("edit 2"));
        assert!(msg.contains("9"));
        assert_eq!(err.edit_index(), 2);
    }

    #[test]
    fn not_a_replica_display() {
        let err = ProtocolError::NotAReplica {
            key: "isStateSynced",
        };
        assert!(err.to_string().contains("isStateSynced"));
    }
}
