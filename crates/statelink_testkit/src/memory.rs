//! In-memory link between a primary store and any number of replica sessions.
//!
//! Replica-to-primary traffic is queued on the hub and delivered by
//! [`MemoryHub::pump_primary`]; primary-to-replica traffic goes straight into
//! the replica session's event queue. Both directions carry `serde_json`
//! values, so every message crosses the same wire shape a real transport
//! would use.

use parking_lot::Mutex;
use serde_json::Value;
use statelink_primary::{LinkId, PrimaryError, PrimaryLink, PrimaryResult, PrimaryStore};
use statelink_protocol::SyncMessage;
use statelink_replica::{
    replica_container, EventSink, EventStream, HandleId, LinkHandle, ListenerKind, ListenerSet,
    ReplicaConfig, ReplicaError, ReplicaReducer, ReplicaResult, ReplicaSession, Transport,
};
use statelink_store::{StateContainer, Store};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
enum HubEvent {
    Message(LinkId, Value),
    Closed(LinkId),
}

struct Connection {
    id: u64,
    name: String,
    listeners: Mutex<ListenerSet>,
    error: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl Connection {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.error.lock().is_none()
    }
}

struct HubInner<C> {
    primary: Arc<PrimaryStore<C>>,
    next_id: AtomicU64,
    inbox: Mutex<VecDeque<HubEvent>>,
    connections: Mutex<Vec<Arc<Connection>>>,
    fail_open: AtomicBool,
}

/// An in-memory transport wired to one primary store. Clones share the hub.
pub struct MemoryHub<C> {
    inner: Arc<HubInner<C>>,
}

impl<C> Clone for MemoryHub<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: StateContainer + 'static> MemoryHub<C> {
    /// Creates a hub in front of `primary`.
    pub fn new(primary: Arc<PrimaryStore<C>>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                primary,
                next_id: AtomicU64::new(0),
                inbox: Mutex::new(VecDeque::new()),
                connections: Mutex::new(Vec::new()),
                fail_open: AtomicBool::new(false),
            }),
        }
    }

    /// The primary store.
    pub fn primary(&self) -> &Arc<PrimaryStore<C>> {
        &self.inner.primary
    }

    /// Makes subsequent opens fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Delivers every queued replica message to the primary.
    ///
    /// Returns the number of events processed.
    pub fn pump_primary(&self) -> usize {
        let mut processed = 0;
        loop {
            let Some(event) = self.inner.inbox.lock().pop_front() else {
                return processed;
            };
            processed += 1;
            match event {
                HubEvent::Message(link, payload) => {
                    // Failures are logged by the primary; the hub keeps going.
                    let _ = self.inner.primary.handle_link_message(link, payload);
                }
                HubEvent::Closed(link) => {
                    self.inner.primary.disconnect(link);
                }
            }
        }
    }

    /// Number of replica messages waiting for the primary.
    pub fn pending(&self) -> usize {
        self.inner.inbox.lock().len()
    }

    /// Number of connections that are still open.
    pub fn open_connections(&self) -> usize {
        self.inner
            .connections
            .lock()
            .iter()
            .filter(|c| c.is_open())
            .count()
    }

    /// Number of connections ever opened.
    pub fn total_connections(&self) -> usize {
        self.inner.connections.lock().len()
    }

    /// Simulates the connection dropping from the primary's side.
    ///
    /// The replica gets a close event and the primary forgets the link.
    pub fn drop_connection(&self, handle: HandleId) {
        let Some(connection) = self.find(handle.0) else {
            return;
        };
        *connection.error.lock() = Some("connection dropped".into());
        self.inner.primary.disconnect(LinkId(connection.id));
        connection
            .listeners
            .lock()
            .emit_close(handle, Some("connection dropped".into()));
    }

    /// Puts a connection in an error state without notifying the replica.
    ///
    /// The primary still considers the link registered, like a port whose
    /// owner was suspended.
    pub fn break_connection(&self, handle: HandleId) {
        if let Some(connection) = self.find(handle.0) {
            *connection.error.lock() = Some("connection broken".into());
        }
    }

    /// Sends a raw value to a replica as if it came from the primary.
    pub fn inject(&self, handle: HandleId, payload: Value) {
        if let Some(connection) = self.find(handle.0) {
            connection.listeners.lock().emit_message(handle, &payload);
        }
    }

    fn find(&self, id: u64) -> Option<Arc<Connection>> {
        self.inner
            .connections
            .lock()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }
}

impl<C: StateContainer + 'static> Transport for MemoryHub<C> {
    type Handle = MemoryHandle;

    fn open(&self, channel: &str) -> ReplicaResult<MemoryHandle> {
        if self.inner.fail_open.load(Ordering::SeqCst) {
            return Err(ReplicaError::transport_retryable("hub refused connection"));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let connection = Arc::new(Connection {
            id,
            name: channel.to_string(),
            listeners: Mutex::new(ListenerSet::new()),
            error: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let link = MemoryLink {
            connection: Arc::clone(&connection),
        };
        self.inner
            .primary
            .connect(Arc::new(link))
            .map_err(|e| ReplicaError::transport_fatal(e.to_string()))?;

        self.inner.connections.lock().push(Arc::clone(&connection));
        let inbox: Arc<dyn Inbox> = Arc::clone(&self.inner) as Arc<dyn Inbox>;
        Ok(MemoryHandle { connection, inbox })
    }
}

trait Inbox: Send + Sync {
    fn push(&self, event: HubEvent);
}

impl<C: StateContainer> Inbox for HubInner<C> {
    fn push(&self, event: HubEvent) {
        self.inbox.lock().push_back(event);
    }
}

/// The replica's end of a hub connection.
pub struct MemoryHandle {
    connection: Arc<Connection>,
    inbox: Arc<dyn Inbox>,
}

impl LinkHandle for MemoryHandle {
    fn id(&self) -> HandleId {
        HandleId(self.connection.id)
    }

    fn send(&self, message: &SyncMessage) -> ReplicaResult<()> {
        if !self.connection.is_open() {
            return Err(ReplicaError::NotConnected);
        }
        let payload = message.to_value()?;
        self.inbox
            .push(HubEvent::Message(LinkId(self.connection.id), payload));
        Ok(())
    }

    fn has_listener(&self, kind: ListenerKind, sink: &EventSink) -> bool {
        self.connection.listeners.lock().contains(kind, sink)
    }

    fn add_listener(&self, kind: ListenerKind, sink: EventSink) {
        self.connection.listeners.lock().add(kind, sink);
    }

    fn error(&self) -> Option<String> {
        if self.connection.closed.load(Ordering::SeqCst) {
            return Some("handle closed".into());
        }
        self.connection.error.lock().clone()
    }

    fn close(&self) {
        if self.connection.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connection.listeners.lock().clear();
        self.inbox.push(HubEvent::Closed(LinkId(self.connection.id)));
    }
}

/// The primary's end of a hub connection.
struct MemoryLink {
    connection: Arc<Connection>,
}

impl PrimaryLink for MemoryLink {
    fn id(&self) -> LinkId {
        LinkId(self.connection.id)
    }

    fn name(&self) -> &str {
        &self.connection.name
    }

    fn send(&self, message: &SyncMessage) -> PrimaryResult<()> {
        if !self.connection.is_open() {
            return Err(PrimaryError::Transport {
                link: self.id(),
                message: "connection closed".into(),
            });
        }
        let payload = message.to_value()?;
        self.connection
            .listeners
            .lock()
            .emit_message(HandleId(self.connection.id), &payload);
        Ok(())
    }
}

/// A replica session over a [`MemoryHub`].
pub type HubSession<C> = ReplicaSession<MemoryHub<C>, Arc<Store<ReplicaReducer>>>;

/// A started replica session with its event queue and local container.
pub struct TestReplica<C: StateContainer + 'static> {
    /// The session.
    pub session: HubSession<C>,
    /// The session's event queue.
    pub events: EventStream,
    /// The replica's local container.
    pub store: Arc<Store<ReplicaReducer>>,
}

impl<C: StateContainer + 'static> TestReplica<C> {
    /// Starts a replica on `hub` with the default configuration.
    pub fn start(hub: &MemoryHub<C>) -> Self {
        Self::start_with(hub, ReplicaConfig::default())
    }

    /// Starts a replica on `hub`.
    pub fn start_with(hub: &MemoryHub<C>, config: ReplicaConfig) -> Self {
        let store = replica_container();
        let (mut session, events) = ReplicaSession::new(config, hub.clone());
        session.init(Arc::clone(&store));
        Self {
            session,
            events,
            store,
        }
    }

    /// Handles every queued event.
    pub fn pump(&mut self) -> usize {
        self.session.pump(&mut self.events)
    }

    /// The replica tree.
    pub fn state(&self) -> Value {
        (*self.store.get_state()).clone()
    }
}

/// Pumps the hub and every replica until no traffic is left.
///
/// Returns the number of events processed.
pub fn settle<C: StateContainer + 'static>(
    hub: &MemoryHub<C>,
    replicas: &mut [TestReplica<C>],
) -> usize {
    let mut total = 0;
    loop {
        let mut round = hub.pump_primary();
        for replica in replicas.iter_mut() {
            round += replica.pump();
        }
        if round == 0 {
            return total;
        }
        total += round;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{counter_primary, without_marker};
    use statelink_replica::SessionState;
    use statelink_store::Action;

    #[test]
    fn replica_converges_through_hub() {
        let primary = counter_primary();
        let hub = MemoryHub::new(Arc::clone(&primary));
        let mut replicas = vec![TestReplica::start(&hub)];

        settle(&hub, &mut replicas);
        assert_eq!(replicas[0].session.state(), SessionState::Synced);
        assert_eq!(without_marker(&replicas[0].state()), *primary.get_state());

        primary.dispatch(Action::new("counter/increment"));
        settle(&hub, &mut replicas);
        assert_eq!(replicas[0].state()["counter"]["value"], 1);
    }

    #[test]
    fn closing_a_handle_unregisters_the_link() {
        let primary = counter_primary();
        let hub = MemoryHub::new(Arc::clone(&primary));
        let mut replicas = vec![TestReplica::start(&hub)];
        settle(&hub, &mut replicas);
        assert_eq!(primary.fanout().link_count(), 1);

        replicas[0].session.detach();
        hub.pump_primary();
        assert_eq!(primary.fanout().link_count(), 0);
        assert_eq!(hub.open_connections(), 0);
    }

    #[test]
    fn foreign_channel_cannot_open() {
        let primary = counter_primary();
        let hub = MemoryHub::new(primary);
        assert!(hub.open("other").is_err());
        assert_eq!(hub.total_connections(), 0);
    }
}
