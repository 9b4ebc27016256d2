//! Primary store enhancer.

use crate::config::PrimaryConfig;
use crate::error::PrimaryResult;
use crate::fanout::Fanout;
use crate::link::{LinkId, PrimaryLink};
use parking_lot::Mutex;
use serde_json::Value;
use statelink_protocol::{diff, SyncMessage};
use statelink_store::{Action, Listener, StateContainer, SubscriptionId};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// The authoritative container, wrapped so that every dispatch is broadcast.
///
/// After the inner container reduces an action, the difference between the
/// last published state and the current one is sent to every link as a single
/// `PATCH_STATE` message. Publication is serialized, so links see batches in
/// the order the states were produced, and a snapshot reply always matches the
/// state the following patches start from.
pub struct PrimaryStore<C> {
    inner: C,
    fanout: Arc<Fanout>,
    published: Mutex<Arc<Value>>,
}

impl<C: StateContainer> PrimaryStore<C> {
    /// Wraps `inner` with a fresh link registry.
    pub fn new(inner: C, config: PrimaryConfig) -> Self {
        Self::with_fanout(inner, Arc::new(Fanout::new(config)))
    }

    /// Wraps `inner` using an existing link registry.
    pub fn with_fanout(inner: C, fanout: Arc<Fanout>) -> Self {
        let published = Mutex::new(inner.get_state());
        Self {
            inner,
            fanout,
            published,
        }
    }

    /// The inner container.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// The link registry.
    pub fn fanout(&self) -> &Arc<Fanout> {
        &self.fanout
    }

    /// Registers a replica link.
    pub fn connect(&self, link: Arc<dyn PrimaryLink>) -> PrimaryResult<bool> {
        self.fanout.connect(link)
    }

    /// Removes a replica link.
    pub fn disconnect(&self, id: LinkId) -> bool {
        self.fanout.disconnect(id)
    }

    /// Handles an inbound value from a registered link.
    ///
    /// A full-sync request is answered on that link only.
    pub fn handle_link_message(&self, link: LinkId, payload: Value) -> PrimaryResult<()> {
        if !self.fanout.contains(link) {
            trace!(%link, "message from unregistered link ignored");
            return Ok(());
        }
        let Some(message) = self.parse(payload) else {
            return Ok(());
        };

        match message {
            SyncMessage::DispatchAction { action } => {
                self.dispatch_remote(action);
                Ok(())
            }
            SyncMessage::SyncGlobal { .. } => {
                // The snapshot is sent under the publication lock so no patch
                // can overtake it on this link.
                let published = self.published.lock();
                debug!(%link, "answering full-sync request");
                let result = self
                    .fanout
                    .reply(link, &SyncMessage::snapshot((**published).clone()));
                drop(published);
                if let Err(e) = &result {
                    warn!(%link, error = %e, "snapshot reply failed");
                }
                result
            }
            SyncMessage::PatchState { .. } => Ok(()),
        }
    }

    /// Handles a request-reply style message.
    ///
    /// Returns the snapshot to send back for a full-sync request, `None` for
    /// everything else.
    pub fn handle_request(&self, payload: Value) -> Option<SyncMessage> {
        match self.parse(payload)? {
            SyncMessage::DispatchAction { action } => {
                self.dispatch_remote(action);
                None
            }
            SyncMessage::SyncGlobal { .. } => Some(SyncMessage::snapshot(self.snapshot())),
            SyncMessage::PatchState { .. } => None,
        }
    }

    /// The last published state.
    pub fn snapshot(&self) -> Value {
        (**self.published.lock()).clone()
    }

    fn parse(&self, payload: Value) -> Option<SyncMessage> {
        let message = match SyncMessage::from_value(payload) {
            Ok(message) => message,
            Err(e) => {
                trace!(error = %e, "ignoring non-sync message");
                return None;
            }
        };
        if !self.fanout.config().accepts(&message) {
            trace!(kind = message.kind(), "ignoring message");
            return None;
        }
        Some(message)
    }

    fn dispatch_remote(&self, action: Value) {
        match Action::from_value(action) {
            Some(action) => {
                trace!(action = %action.kind, "dispatching replica action");
                self.dispatch(action);
            }
            None => trace!("dropping dispatch message without a valid action"),
        }
    }

    fn publish(&self) {
        let mut published = self.published.lock();
        let current = self.inner.get_state();
        if Arc::ptr_eq(&published, &current) {
            return;
        }

        let edits = diff(&published, &current);
        *published = current;
        if edits.is_empty() {
            return;
        }
        trace!(edits = edits.len(), "publishing patch");
        self.fanout.submit_patches(edits);
    }
}

impl<C: StateContainer> StateContainer for PrimaryStore<C> {
    fn get_state(&self) -> Arc<Value> {
        self.inner.get_state()
    }

    fn dispatch(&self, action: Action) -> Action {
        let action = self.inner.dispatch(action);
        self.publish();
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
    use crate::link::MockLink;
    use serde_json::json;
    use statelink_protocol::Edit;
    use statelink_store::Store;

    fn counter(state: &Value, action: &Action) -> Option<Value> {
        let count = state["count"].as_i64().unwrap_or(0);
        match action.kind.as_str() {
            "increment" => Some(json!({"count": count + 1})),
            "noop" => Some(state.clone()),
            _ => None,
        }
    }

    fn primary() -> (
        PrimaryStore<Store<fn(&Value, &Action) -> Option<Value>>>,
        Arc<MockLink>,
    ) {
        let store = PrimaryStore::new(
            Store::new(
                counter as fn(&Value, &Action) -> Option<Value>,
                json!({"count": 0}),
            ),
            PrimaryConfig::default(),
        );
        let link = Arc::new(MockLink::new(1, "statelink"));
        store.connect(link.clone()).unwrap();
        (store, link)
    }

    #[test]
    fn dispatch_broadcasts_diff() {
        let (store, link) = primary();
        store.dispatch(Action::new("increment"));

        assert_eq!(*store.get_state(), json!({"count": 1}));
        assert_eq!(
            link.sent(),
            vec![SyncMessage::patch(vec![Edit::replace(
                vec!["count".into()],
                json!(1)
            )])]
        );
    }

    #[test]
    fn unchanged_state_sends_nothing() {
        let (store, link) = primary();
        store.dispatch(Action::new("unknown"));
        store.dispatch(Action::new("noop"));
        assert!(link.sent().is_empty());
    }

    #[test]
    fn full_sync_request_gets_snapshot_on_that_link() {
        let (store, link) = primary();
        let other = Arc::new(MockLink::new(2, "statelink"));
        store.connect(other.clone()).unwrap();
        store.dispatch(Action::new("increment"));
        link.clear();
        other.clear();

        store
            .handle_link_message(
                LinkId(1),
                SyncMessage::sync_request().to_value().unwrap(),
            )
            .unwrap();

        assert_eq!(link.sent(), vec![SyncMessage::snapshot(json!({"count": 1}))]);
        assert!(other.sent().is_empty());
    }

    #[test]
    fn forwarded_action_is_dispatched_and_broadcast() {
        let (store, link) = primary();
        store
            .handle_link_message(
                LinkId(1),
                json!({"type": "DISPATCH_ACTION", "action": {"type": "increment"}}),
            )
            .unwrap();

        assert_eq!(*store.get_state(), json!({"count": 1}));
        assert_eq!(link.sent().len(), 1);
    }

    #[test]
    fn invalid_messages_are_dropped() {
        let (store, link) = primary();
        for payload in [
            json!({"type": "DISPATCH_ACTION", "action": null}),
            json!({"type": "DISPATCH_ACTION", "action": 5}),
            json!({"type": "PATCH_STATE", "patches": []}),
            json!({"type": "SOMETHING_ELSE"}),
            json!(null),
        ] {
            store.handle_link_message(LinkId(1), payload).unwrap();
        }
        assert_eq!(*store.get_state(), json!({"count": 0}));
        assert!(link.sent().is_empty());
    }

    #[test]
    fn unregistered_links_are_ignored() {
        let (store, _link) = primary();
        store
            .handle_link_message(LinkId(42), SyncMessage::sync_request().to_value().unwrap())
            .unwrap();
        assert_eq!(store.fanout().stats().messages_sent, 0);
    }

    #[test]
    fn request_reply_style() {
        let (store, _link) = primary();
        let reply = store.handle_request(SyncMessage::sync_request().to_value().unwrap());
        assert_eq!(reply, Some(SyncMessage::snapshot(json!({"count": 0}))));

        let none = store.handle_request(
            SyncMessage::dispatch(json!({"type": "increment"}))
                .to_value()
                .unwrap(),
        );
        assert!(none.is_none());
        assert_eq!(*store.get_state(), json!({"count": 1}));
    }
}
