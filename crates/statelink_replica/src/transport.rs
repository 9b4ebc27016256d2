//! Transport capability required by a replica session.
//!
//! A concrete medium (message port, IPC channel, ...) adapts itself to
//! [`Transport`] and [`LinkHandle`]. Inbound traffic is never delivered by
//! calling into the session directly: a handle pushes [`LinkEvent`]s into the
//! [`EventSink`]s registered as its listeners, and the session consumes them one
//! at a time.

use crate::error::{ReplicaError, ReplicaResult};
use parking_lot::Mutex;
use serde_json::Value;
use statelink_protocol::SyncMessage;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifies one transport handle over the lifetime of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Something that happened on a transport handle.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A raw inbound value. Not yet validated as a [`SyncMessage`].
    Message {
        /// Handle the value arrived on.
        handle: HandleId,
        /// The raw value.
        payload: Value,
    },
    /// The handle was closed by the remote side or failed.
    Closed {
        /// Handle that closed.
        handle: HandleId,
        /// Error description, if any.
        reason: Option<String>,
    },
}

impl LinkEvent {
    /// The handle this event belongs to.
    pub fn handle(&self) -> HandleId {
        match self {
            LinkEvent::Message { handle, .. } | LinkEvent::Closed { handle, .. } => *handle,
        }
    }
}

/// Sending half of a session's event queue.
pub type EventSink = mpsc::UnboundedSender<LinkEvent>;

/// Receiving half of a session's event queue.
pub type EventStream = mpsc::UnboundedReceiver<LinkEvent>;

/// The two listener slots of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Inbound messages.
    Message,
    /// Disconnect notifications.
    Close,
}

/// Listener bookkeeping shared by handle implementations.
///
/// Adding a sink that is already registered for the same kind is a no-op.
#[derive(Debug, Default)]
pub struct ListenerSet {
    message: Vec<EventSink>,
    close: Vec<EventSink>,
}

impl ListenerSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: ListenerKind) -> &Vec<EventSink> {
        match kind {
            ListenerKind::Message => &self.message,
            ListenerKind::Close => &self.close,
        }
    }

    /// Returns true if `sink` is registered for `kind`.
    pub fn contains(&self, kind: ListenerKind, sink: &EventSink) -> bool {
        self.slot(kind).iter().any(|s| s.same_channel(sink))
    }

    /// Registers `sink` for `kind`. Returns false if it already was.
    pub fn add(&mut self, kind: ListenerKind, sink: EventSink) -> bool {
        if self.contains(kind, &sink) {
            return false;
        }
        match kind {
            ListenerKind::Message => self.message.push(sink),
            ListenerKind::Close => self.close.push(sink),
        }
        true
    }

    /// Number of sinks registered for `kind`.
    pub fn len(&self, kind: ListenerKind) -> usize {
        self.slot(kind).len()
    }

    /// Returns true if no listener of any kind is registered.
    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.close.is_empty()
    }

    /// Delivers an inbound value to every message listener.
    pub fn emit_message(&self, handle: HandleId, payload: &Value) {
        for sink in &self.message {
            // A dropped receiver means the session is gone.
            let _ = sink.send(LinkEvent::Message {
                handle,
                payload: payload.clone(),
            });
        }
    }

    /// Notifies every close listener.
    pub fn emit_close(&self, handle: HandleId, reason: Option<String>) {
        for sink in &self.close {
            let _ = sink.send(LinkEvent::Closed {
                handle,
                reason: reason.clone(),
            });
        }
    }

    /// Drops every listener.
    pub fn clear(&mut self) {
        self.message.clear();
        self.close.clear();
    }
}

/// One open connection to the primary.
pub trait LinkHandle: Send + Sync {
    /// Returns the handle's identity.
    fn id(&self) -> HandleId;

    /// Sends a message to the primary.
    fn send(&self, message: &SyncMessage) -> ReplicaResult<()>;

    /// Returns true if `sink` is already listening for `kind`.
    fn has_listener(&self, kind: ListenerKind, sink: &EventSink) -> bool;

    /// Registers `sink` as a listener for `kind`.
    fn add_listener(&self, kind: ListenerKind, sink: EventSink);

    /// The error state of the handle, if it has one.
    fn error(&self) -> Option<String>;

    /// Returns true if the handle can be used.
    fn is_healthy(&self) -> bool {
        self.error().is_none()
    }

    /// Retires the handle: drops its listeners and releases the connection.
    ///
    /// No events are delivered for this handle afterwards.
    fn close(&self);
}

/// Opens handles to the primary.
pub trait Transport: Send + Sync {
    /// The handle type produced by this transport.
    type Handle: LinkHandle + 'static;

    /// Opens a new handle on `channel`.
    fn open(&self, channel: &str) -> ReplicaResult<Self::Handle>;
}

/// A mock transport for testing.
///
/// Every opened handle is recorded so tests can inspect what was sent and
/// inject inbound traffic or disconnects.
#[derive(Debug, Default)]
pub struct MockTransport {
    next_id: AtomicU64,
    fail_open: AtomicBool,
    handles: Mutex<Vec<MockHandle>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `open` calls fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Every handle opened so far, oldest first.
    pub fn handles(&self) -> Vec<MockHandle> {
        self.handles.lock().clone()
    }

    /// The most recently opened handle.
    pub fn last_handle(&self) -> Option<MockHandle> {
        self.handles.lock().last().cloned()
    }

    /// Number of successful `open` calls.
    pub fn open_count(&self) -> usize {
        self.handles.lock().len()
    }
}

impl Transport for MockTransport {
    type Handle = MockHandle;

    fn open(&self, channel: &str) -> ReplicaResult<MockHandle> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(ReplicaError::transport_retryable("mock open failure"));
        }
        let id = HandleId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let handle = MockHandle::new(id, channel);
        self.handles.lock().push(handle.clone());
        Ok(handle)
    }
}

impl<T: Transport> Transport for Arc<T> {
    type Handle = T::Handle;

    fn open(&self, channel: &str) -> ReplicaResult<Self::Handle> {
        (**self).open(channel)
    }
}

#[derive(Debug)]
struct MockHandleState {
    id: HandleId,
    channel: String,
    sent: Mutex<Vec<SyncMessage>>,
    listeners: Mutex<ListenerSet>,
    error: Mutex<Option<String>>,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

/// Handle produced by [`MockTransport`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<MockHandleState>,
}

impl MockHandle {
    fn new(id: HandleId, channel: &str) -> Self {
        Self {
            state: Arc::new(MockHandleState {
                id,
                channel: channel.to_string(),
                sent: Mutex::new(Vec::new()),
                listeners: Mutex::new(ListenerSet::new()),
                error: Mutex::new(None),
                fail_sends: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Channel the handle was opened on.
    pub fn channel(&self) -> String {
        self.state.channel.clone()
    }

    /// Messages sent through this handle.
    pub fn sent(&self) -> Vec<SyncMessage> {
        self.state.sent.lock().clone()
    }

    /// Number of full-sync requests sent through this handle.
    pub fn sync_requests(&self) -> usize {
        self.state
            .sent
            .lock()
            .iter()
            .filter(|m| m.is_sync_request())
            .count()
    }

    /// Forgets recorded messages.
    pub fn clear_sent(&self) {
        self.state.sent.lock().clear();
    }

    /// Simulates an inbound value from the primary.
    pub fn deliver(&self, payload: Value) {
        let listeners = self.state.listeners.lock();
        listeners.emit_message(self.state.id, &payload);
    }

    /// Simulates the remote side dropping the connection.
    pub fn disconnect(&self, reason: &str) {
        *self.state.error.lock() = Some(reason.to_string());
        let listeners = self.state.listeners.lock();
        listeners.emit_close(self.state.id, Some(reason.to_string()));
    }

    /// Puts the handle into an error state without notifying anyone.
    pub fn set_error(&self, reason: &str) {
        *self.state.error.lock() = Some(reason.to_string());
    }

    /// Makes sends fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Returns true once the session retired the handle.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Number of listeners of `kind`.
    pub fn listener_count(&self, kind: ListenerKind) -> usize {
        self.state.listeners.lock().len(kind)
    }
}

impl LinkHandle for MockHandle {
    fn id(&self) -> HandleId {
        self.state.id
    }

    fn send(&self, message: &SyncMessage) -> ReplicaResult<()> {
        if self.is_closed() {
            return Err(ReplicaError::NotConnected);
        }
        if self.state.fail_sends.load(Ordering::SeqCst) {
            return Err(ReplicaError::transport_retryable("mock send failure"));
        }
        self.state.sent.lock().push(message.clone());
        Ok(())
    }

    fn has_listener(&self, kind: ListenerKind, sink: &EventSink) -> bool {
        self.state.listeners.lock().contains(kind, sink)
    }

    fn add_listener(&self, kind: ListenerKind, sink: EventSink) {
        self.state.listeners.lock().add(kind, sink);
    }

    fn error(&self) -> Option<String> {
        if self.is_closed() {
            return Some("handle closed".into());
        }
        self.state.error.lock().clone()
    }

    fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.listeners.lock().clear();
    }
}
