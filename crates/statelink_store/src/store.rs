//! Reducer-driven state container.

use crate::action::Action;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Computes the next state for an action.
pub trait Reducer: Send + Sync {
    /// Returns the next state, or `None` if `action` leaves `state` unchanged.
    fn reduce(&self, state: &Value, action: &Action) -> Option<Value>;
}

impl<F> Reducer for F
where
    F: Fn(&Value, &Action) -> Option<Value> + Send + Sync,
{
    fn reduce(&self, state: &Value, action: &Action) -> Option<Value> {
        self(state, action)
    }
}

/// A change listener. Called after every dispatch.
pub type Listener = Box<dyn Fn() + Send + Sync>;

/// Handle returned by [`StateContainer::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What the replication subsystem requires from a host state container.
pub trait StateContainer: Send + Sync {
    /// Returns the current state.
    fn get_state(&self) -> Arc<Value>;

    /// Dispatches an action and returns it.
    fn dispatch(&self, action: Action) -> Action;

    /// Registers a change listener.
    fn subscribe(&self, listener: Listener) -> SubscriptionId;

    /// Removes a change listener. Returns false if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

impl<T: StateContainer + ?Sized> StateContainer for Arc<T> {
    fn get_state(&self) -> Arc<Value> {
        (**self).get_state()
    }

    fn dispatch(&self, action: Action) -> Action {
        (**self).dispatch(action)
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        (**self).subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        (**self).unsubscribe(id)
    }
}

/// An in-memory store.
///
/// Dispatches are serialized; listeners run after the new state is visible and
/// outside any internal lock, so a listener may read or dispatch again.
pub struct Store<R: Reducer> {
    reducer: R,
    state: RwLock<Arc<Value>>,
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn Fn() + Send + Sync>)>>,
    next_subscription: AtomicU64,
    dispatching: Mutex<()>,
}

impl<R: Reducer> Store<R> {
    /// Creates a store with an initial state.
    pub fn new(reducer: R, initial: Value) -> Self {
        Self {
            reducer,
            state: RwLock::new(Arc::new(initial)),
            listeners: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            dispatching: Mutex::new(()),
        }
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify(&self) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl<R: Reducer> StateContainer for Store<R> {
    fn get_state(&self) -> Arc<Value> {
        Arc::clone(&self.state.read())
    }

    fn dispatch(&self, action: Action) -> Action {
        {
            let _guard = self.dispatching.lock();
            let current = self.get_state();
            match self.reducer.reduce(&current, &action) {
                Some(next) => *self.state.write() = Arc::new(next),
                None => trace!(action = %action.kind, "action left state unchanged"),
            }
        }
        self.notify();
        action
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, Arc::from(listener)));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}
