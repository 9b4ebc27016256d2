//! Readiness predicates for replica containers.

use crate::error::{ReplicaError, ReplicaResult};
use statelink_protocol::{is_replica_tree, is_synced};
use statelink_store::StateContainer;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

/// Returns true if the container holds a replica tree.
pub fn is_replica_store<S: StateContainer + ?Sized>(store: &S) -> bool {
    is_replica_tree(&store.get_state())
}

/// Whether the replica tree reflects a confirmed snapshot.
///
/// Asking a non-replica container is a programming error and fails with
/// [`ReplicaError::NotAReplica`].
pub fn is_ready_sync<S: StateContainer + ?Sized>(store: &S) -> ReplicaResult<bool> {
    is_synced(&store.get_state()).map_err(|_| ReplicaError::NotAReplica)
}

/// Completes once the replica tree is synced.
///
/// Returns immediately if it already is. The change listener registered
/// while waiting is removed before returning.
pub async fn wait_until_ready<S: StateContainer + ?Sized>(store: &S) -> ReplicaResult<()> {
    if is_ready_sync(store)? {
        return Ok(());
    }

    let notify = Arc::new(Notify::new());
    let waker = Arc::clone(&notify);
    let subscription = store.subscribe(Box::new(move || waker.notify_one()));

    let result = loop {
        match is_ready_sync(store) {
            Ok(true) => break Ok(()),
            Ok(false) => trace!("replica not ready yet"),
            Err(e) => break Err(e),
        }
        notify.notified().await;
    };

    store.unsubscribe(subscription);
    result
}
