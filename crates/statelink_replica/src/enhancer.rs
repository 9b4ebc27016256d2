//! Replica store enhancer.

use crate::error::ReplicaResult;
use crate::reducer::{is_internal_action, ReplicaReducer};
use crate::ready::is_ready_sync;
use serde_json::Value;
use statelink_protocol::{initial_replica_state, SyncMessage};
use statelink_store::{Action, Listener, StateContainer, Store, SubscriptionId};
use std::sync::Arc;
use tracing::trace;

/// Where a replica sends the actions it does not execute itself.
pub trait ActionForwarder: Send + Sync {
    /// Hands a `DISPATCH_ACTION` message to the link.
    fn forward(&self, message: SyncMessage);
}

impl<F> ActionForwarder for F
where
    F: Fn(SyncMessage) + Send + Sync,
{
    fn forward(&self, message: SyncMessage) {
        self(message)
    }
}

/// Creates the local container a replica session writes into.
pub fn replica_container() -> Arc<Store<ReplicaReducer>> {
    Arc::new(Store::new(ReplicaReducer, initial_replica_state()))
}

/// A state container whose dispatches go to the primary.
///
/// Reads and subscriptions are served by the inner container. Only the
/// session's internal apply-patch and snapshot actions reach the inner
/// container's reducer; every other action is wrapped in a
/// [`SyncMessage::DispatchAction`] and forwarded.
pub struct ReplicaStore<S, F> {
    inner: S,
    forwarder: F,
}

impl<S: StateContainer, F: ActionForwarder> ReplicaStore<S, F> {
    /// Wraps `inner`.
    pub fn new(inner: S, forwarder: F) -> Self {
        Self { inner, forwarder }
    }

    /// The inner container.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The forwarder.
    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    /// Whether the tree reflects a confirmed snapshot.
    pub fn is_ready(&self) -> ReplicaResult<bool> {
        is_ready_sync(&self.inner)
    }
}

impl<S: StateContainer, F: ActionForwarder> StateContainer for ReplicaStore<S, F> {
    fn get_state(&self) -> Arc<Value> {
        self.inner.get_state()
    }

    fn dispatch(&self, action: Action) -> Action {
        if is_internal_action(&action) {
            return self.inner.dispatch(action);
        }
        trace!(action = %action.kind, "forwarding action to primary");
        self.forwarder
            .forward(SyncMessage::dispatch(action.to_value()));
        action
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        self.inner.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::sync_global_action;
    use parking_lot::Mutex;
    use serde_json::json;
    use statelink_protocol::SYNC_KEY;

    fn recording() -> (Arc<Mutex<Vec<SyncMessage>>>, impl Fn(SyncMessage) + Send + Sync) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        (sent, move |message| sink.lock().push(message))
    }

    #[test]
    fn user_actions_are_forwarded() {
        let (sent, forwarder) = recording();
        let store = ReplicaStore::new(replica_container(), forwarder);

        let action = Action::new("counter/increment").with_payload(json!(2));
        let returned = store.dispatch(action.clone());

        assert_eq!(returned, action);
        assert_eq!(
            *sent.lock(),
            vec![SyncMessage::dispatch(
                json!({"type": "counter/increment", "payload": 2})
            )]
        );
        assert_eq!(*store.get_state(), initial_replica_state());
    }

    #[test]
    fn internal_actions_reach_the_reducer() {
        let (sent, forwarder) = recording();
        let store = ReplicaStore::new(replica_container(), forwarder);

        store.dispatch(sync_global_action(json!({"count": 3})));

        assert!(sent.lock().is_empty());
        assert_eq!(*store.get_state(), json!({"count": 3, SYNC_KEY: true}));
        assert!(store.is_ready().unwrap());
    }

    #[test]
    fn subscriptions_use_the_inner_container() {
        let (_sent, forwarder) = recording();
        let inner = replica_container();
        let store = ReplicaStore::new(Arc::clone(&inner), forwarder);

        let id = store.subscribe(Box::new(|| {}));
        assert_eq!(inner.listener_count(), 1);
        assert!(store.unsubscribe(id));
        assert_eq!(inner.listener_count(), 0);
    }
}
