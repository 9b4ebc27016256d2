//! # statelink replica
//!
//! Replica side of a statelink link.
//!
//! This crate provides:
//! - The link session state machine (connect, full sync, patch apply, reconnect)
//! - A fixed-interval retry timer for unanswered full-sync requests
//! - Heartbeat, focus and resume triggered resyncs
//! - The replica store enhancer that forwards actions to the primary
//! - Readiness predicates
//! - A tokio driver that runs a session in its own task
//!
//! ## Architecture
//!
//! A replica never computes state itself. It asks the primary for a snapshot,
//! then applies the edit batches the primary broadcasts after each dispatch:
//! 1. Open a handle and send `SYNC_GLOBAL` without state
//! 2. Re-send that request every retry interval until a snapshot arrives
//! 3. Apply `PATCH_STATE` batches in arrival order
//! 4. On disconnect, open a fresh handle and start again from step 1
//!
//! ## Key Invariants
//!
//! - At most one live handle per session
//! - Events from a retired handle are ignored
//! - Listener registration on a handle is idempotent
//! - A rejected patch batch leaves the tree unsynced until the next snapshot

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod driver;
mod enhancer;
mod error;
mod ready;
mod reducer;
mod session;
mod timer;
mod transport;

pub use config::{HeartbeatConfig, ReplicaConfig, DEFAULT_CHANNEL};
pub use driver::{spawn_replica, DriverHandle, ReplicaDriver, SpawnedReplica};
pub use enhancer::{replica_container, ActionForwarder, ReplicaStore};
pub use error::{ReplicaError, ReplicaResult};
pub use ready::{is_ready_sync, is_replica_store, wait_until_ready};
pub use reducer::{
    apply_patch_action, is_internal_action, sync_global_action, ReplicaReducer,
    APPLY_PATCH_ACTION, SYNC_GLOBAL_ACTION,
};
pub use session::{ReplicaSession, SessionState, SessionStats};
pub use timer::IntervalTimer;
pub use transport::{
    EventSink, EventStream, HandleId, LinkEvent, LinkHandle, ListenerKind, ListenerSet,
    MockHandle, MockTransport, Transport,
};
