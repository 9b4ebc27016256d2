//! Replica link session state machine.

use crate::config::ReplicaConfig;
use crate::error::{ReplicaError, ReplicaResult};
use crate::reducer::{apply_patch_action, sync_global_action};
use crate::timer::IntervalTimer;
use crate::transport::{
    EventSink, EventStream, HandleId, LinkEvent, LinkHandle, ListenerKind, Transport,
};
use serde_json::Value;
use statelink_protocol::{is_synced, SyncMessage};
use statelink_store::StateContainer;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Where a session is in its link lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handle.
    Disconnected,
    /// A handle is being opened.
    Connecting,
    /// A full-sync request is outstanding.
    AwaitingAck,
    /// A snapshot answered the last full-sync request.
    Synced,
}

impl SessionState {
    /// Returns true if the session holds a handle.
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::AwaitingAck | SessionState::Synced)
    }
}

/// Statistics about a session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Full-sync requests sent.
    pub requests_sent: u64,
    /// Patch messages applied.
    pub patches_applied: u64,
    /// Snapshots applied.
    pub snapshots_applied: u64,
    /// Handles opened after the first one.
    pub reconnects: u64,
    /// Inbound values that were not sync messages.
    pub dropped_messages: u64,
    /// Sends that failed.
    pub send_failures: u64,
    /// When the last snapshot was applied.
    pub last_synced_at: Option<Instant>,
}

/// The replica side of one link.
///
/// Owns at most one transport handle at a time. Inbound traffic arrives as
/// [`LinkEvent`]s on the [`EventStream`] returned by [`ReplicaSession::new`];
/// whoever drives the session feeds them to [`ReplicaSession::handle_event`]
/// and calls [`ReplicaSession::on_retry_tick`] / [`ReplicaSession::heartbeat`]
/// on their schedules. [`crate::ReplicaDriver`] does this on tokio.
pub struct ReplicaSession<T: Transport, S: StateContainer> {
    config: ReplicaConfig,
    transport: T,
    store: Option<S>,
    handle: Option<T::Handle>,
    sink: EventSink,
    state: SessionState,
    last_update: Option<Instant>,
    retry_timer: Option<IntervalTimer>,
    opened_any: bool,
    stats: SessionStats,
}

impl<T: Transport, S: StateContainer> ReplicaSession<T, S> {
    /// Creates a disconnected session.
    pub fn new(config: ReplicaConfig, transport: T) -> (Self, EventStream) {
        let (sink, events) = mpsc::unbounded_channel();
        let session = Self {
            config,
            transport,
            store: None,
            handle: None,
            sink,
            state: SessionState::Disconnected,
            last_update: None,
            retry_timer: None,
            opened_any: false,
            stats: SessionStats::default(),
        };
        (session, events)
    }

    /// Attaches the local store and sets up the link.
    pub fn init(&mut self, store: S) {
        self.store = Some(store);
        self.setup_link();
    }

    /// Detaches the store and retires the handle.
    ///
    /// Without a store the session no longer reconnects on disconnect.
    pub fn detach(&mut self) -> Option<S> {
        self.retire_handle();
        if let Some(timer) = self.retry_timer.as_mut() {
            timer.stop();
        }
        self.state = SessionState::Disconnected;
        self.store.take()
    }

    /// Ensures a healthy handle exists and returns its id.
    ///
    /// A healthy handle is kept as is; otherwise a new one replaces it.
    pub fn connect(&mut self) -> ReplicaResult<HandleId> {
        if let Some(handle) = &self.handle {
            if handle.is_healthy() {
                return Ok(handle.id());
            }
        }

        self.retire_handle();
        self.state = SessionState::Connecting;

        match self.transport.open(&self.config.channel) {
            Ok(handle) => {
                let id = handle.id();
                if self.opened_any {
                    self.stats.reconnects += 1;
                }
                self.opened_any = true;
                debug!(handle = %id, channel = %self.config.channel, "link opened");
                self.handle = Some(handle);
                self.last_update = None;
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, channel = %self.config.channel, "failed to open link");
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Sends a message to the primary.
    ///
    /// Without a usable handle the link is set up first. Send failures are
    /// logged and swallowed; the retry timer recovers from them.
    pub fn post_message(&mut self, message: &SyncMessage) {
        if !self.is_handle_valid() {
            debug!(kind = message.kind(), "handle not usable, setting up link");
            self.setup_link();
        }
        self.send(message);
    }

    /// Processes one event from the event stream.
    ///
    /// Events from a handle other than the current one are ignored.
    pub fn handle_event(&mut self, event: LinkEvent) {
        let current = self.handle.as_ref().map(|h| h.id());
        if current != Some(event.handle()) {
            trace!(handle = %event.handle(), "event from retired handle ignored");
            return;
        }

        match event {
            LinkEvent::Message { payload, .. } => self.on_message(payload),
            LinkEvent::Closed { reason, .. } => self.on_disconnect(reason),
        }
    }

    /// Drains every queued event without waiting. Returns how many were handled.
    pub fn pump(&mut self, events: &mut EventStream) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Retry timer callback.
    ///
    /// Stops the timer once the replica is synced, otherwise re-sends the
    /// full-sync request.
    pub fn on_retry_tick(&mut self) {
        let synced = self.is_marked_synced();
        let Some(timer) = self.retry_timer.as_mut().filter(|t| t.is_active()) else {
            return;
        };
        let tick = timer.record_tick();

        if synced {
            timer.stop();
            debug!(ticks = tick, "synced, retry timer stopped");
            return;
        }

        debug!(tick, "not synced yet, retrying full sync");
        if self.is_handle_valid() {
            self.send_sync_request();
        } else {
            self.setup_link();
        }
    }

    /// Liveness check against the current time.
    pub fn heartbeat(&mut self) {
        self.heartbeat_at(Instant::now());
    }

    /// Liveness check.
    ///
    /// If nothing arrived for longer than the configured threshold, one
    /// full-sync request is sent. Before the first inbound message this does
    /// nothing; the retry timer covers that window.
    pub fn heartbeat_at(&mut self, now: Instant) {
        let Some(heartbeat) = self.config.heartbeat else {
            return;
        };
        let Some(last) = self.last_update else {
            return;
        };

        let silence = now.saturating_duration_since(last);
        if silence <= heartbeat.resync_threshold {
            trace!(?silence, "heartbeat: link is live");
            return;
        }

        info!(?silence, "no traffic within threshold, requesting full sync");
        self.last_update = Some(now);
        self.request_resync();
    }

    /// Foreground regain. Forces a resync when enabled.
    pub fn focus(&mut self) {
        if !self.config.resync_on_focus {
            return;
        }
        info!("focus regained, requesting full sync");
        self.last_update = Some(Instant::now());
        self.request_resync();
    }

    /// Host resumed from suspension: replace the handle with a fresh one.
    pub fn resume(&mut self) {
        if self.handle.is_some() {
            debug!("resume: retiring current handle");
            self.retire_handle();
        }
        self.setup_link();
    }

    /// Whether the replica tree reflects a confirmed snapshot.
    ///
    /// Fails if the attached store is not a replica.
    pub fn is_ready(&self) -> ReplicaResult<bool> {
        let store = self.store.as_ref().ok_or(ReplicaError::NotConnected)?;
        is_synced(&store.get_state()).map_err(|_| ReplicaError::NotAReplica)
    }

    /// True if the last full-sync request was answered and the marker is set.
    pub fn is_marked_synced(&self) -> bool {
        self.state == SessionState::Synced && self.is_ready().unwrap_or(false)
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Id of the current handle.
    pub fn handle_id(&self) -> Option<HandleId> {
        self.handle.as_ref().map(|h| h.id())
    }

    /// When the last inbound message arrived on the current handle.
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Returns true while the retry timer runs.
    pub fn retry_active(&self) -> bool {
        self.retry_timer
            .as_ref()
            .map(IntervalTimer::is_active)
            .unwrap_or(false)
    }

    /// Session statistics.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Session configuration.
    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// The attached store.
    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn is_handle_valid(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_healthy()).unwrap_or(false)
    }

    /// Connects, attaches listeners, requests a snapshot and arms the retry
    /// timer.
    fn setup_link(&mut self) {
        if self.connect().is_ok() {
            self.attach_listeners();
            self.send_sync_request();
        }
        // Armed even when the open failed: the next tick tries again.
        self.arm_retry_timer();
    }

    fn attach_listeners(&self) {
        let Some(handle) = &self.handle else {
            return;
        };
        for kind in [ListenerKind::Message, ListenerKind::Close] {
            if !handle.has_listener(kind, &self.sink) {
                handle.add_listener(kind, self.sink.clone());
            }
        }
    }

    fn arm_retry_timer(&mut self) {
        let mut timer = IntervalTimer::new(self.config.retry_interval);
        timer.start();
        self.retry_timer = Some(timer);
    }

    fn send_sync_request(&mut self) {
        self.state = SessionState::AwaitingAck;
        self.stats.requests_sent += 1;
        self.send(&SyncMessage::sync_request());
    }

    fn request_resync(&mut self) {
        if self.is_handle_valid() {
            self.send_sync_request();
            self.arm_retry_timer();
        } else {
            self.setup_link();
        }
    }

    fn send(&mut self, message: &SyncMessage) {
        let Some(handle) = &self.handle else {
            warn!(kind = message.kind(), "no handle, message dropped");
            self.stats.send_failures += 1;
            return;
        };
        match handle.send(message) {
            Ok(()) => trace!(handle = %handle.id(), kind = message.kind(), "message sent"),
            Err(e) => {
                warn!(handle = %handle.id(), kind = message.kind(), error = %e, "send failed");
                self.stats.send_failures += 1;
            }
        }
    }

    fn retire_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(handle = %handle.id(), "retiring handle");
            handle.close();
        }
    }

    fn on_message(&mut self, payload: Value) {
        let message = match SyncMessage::from_value(payload) {
            Ok(message) => message,
            Err(e) => {
                trace!(error = %e, "ignoring non-sync message");
                self.stats.dropped_messages += 1;
                return;
            }
        };

        let now = Instant::now();
        self.last_update = Some(now);

        let Some(store) = &self.store else {
            trace!(kind = message.kind(), "no store attached, message ignored");
            return;
        };

        match message {
            SyncMessage::PatchState { patches } => {
                let was_ready = self.is_ready().unwrap_or(false);
                store.dispatch(apply_patch_action(&patches));
                self.stats.patches_applied += 1;
                trace!(edits = patches.len(), "patch applied");

                if was_ready && !self.is_ready().unwrap_or(false) {
                    warn!("replica diverged from primary, requesting full sync");
                    self.request_resync();
                }
            }
            SyncMessage::SyncGlobal { state: Some(state) } => {
                store.dispatch(sync_global_action(state));
                if self.is_ready().unwrap_or(false) {
                    self.state = SessionState::Synced;
                    self.stats.snapshots_applied += 1;
                    self.stats.last_synced_at = Some(now);
                    debug!("snapshot applied, replica synced");
                }
            }
            SyncMessage::SyncGlobal { state: None } => {
                trace!("full-sync request received on replica side, ignored");
            }
            SyncMessage::DispatchAction { .. } => {
                trace!("dispatch message received on replica side, ignored");
            }
        }
    }

    fn on_disconnect(&mut self, reason: Option<String>) {
        warn!(
            reason = reason.as_deref().unwrap_or("unknown"),
            "link disconnected"
        );
        self.retire_handle();
        self.state = SessionState::Disconnected;

        if self.store.is_some() {
            self.setup_link();
        }
    }
}
