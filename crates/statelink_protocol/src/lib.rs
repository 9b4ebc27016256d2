//! # statelink protocol
//!
//! Diff engine, patch engine and wire messages for statelink.
//!
//! This crate provides:
//! - `Edit` / `EditOp` / `PathSegment` describing one structural change
//! - `diff` turning a before/after state pair into an ordered edit list
//! - `apply` replaying an edit list against a tree
//! - `SyncMessage` with its validating constructor and JSON codec
//! - Synchronization marker helpers for replica trees
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - `apply(a, diff(a, b)) == b` for any two trees
//! - `diff(a, a)` is empty
//! - A snapshot replaces the whole tree, it is never merged

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod diff;
mod edit;
mod error;
mod marker;
mod messages;
mod patch;

pub use diff::diff;
pub use edit::{Edit, EditOp, PathSegment};
pub use error::{PatchError, ProtocolError, ProtocolResult};
pub use marker::{initial_replica_state, is_replica_tree, is_synced, set_synced, SYNC_KEY};
pub use messages::{
    is_sync_message, SyncMessage, DISPATCH_ACTION, MESSAGE_TYPES, PATCH_STATE, SYNC_GLOBAL,
};
pub use patch::{apply, apply_in_place, apply_snapshot};

/// A JSON-representable state tree.
pub type StateTree = serde_json::Value;
