//! Tokio driver for a replica session.
//!
//! The driver owns the session and is the only thing that touches it. Events,
//! commands and timer ticks are processed one at a time in a single task.

use crate::config::ReplicaConfig;
use crate::enhancer::{replica_container, ActionForwarder, ReplicaStore};
use crate::error::{ReplicaError, ReplicaResult};
use crate::reducer::ReplicaReducer;
use crate::session::ReplicaSession;
use crate::transport::{EventStream, Transport};
use statelink_protocol::SyncMessage;
use statelink_store::{StateContainer, Store};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Command {
    Post(SyncMessage),
    Focus,
    Resume,
    Shutdown,
}

/// Cloneable handle for talking to a running driver.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl DriverHandle {
    fn command(&self, command: Command) -> ReplicaResult<()> {
        self.commands
            .send(command)
            .map_err(|_| ReplicaError::DriverStopped)
    }

    /// Sends a message to the primary through the session.
    pub fn post(&self, message: SyncMessage) -> ReplicaResult<()> {
        self.command(Command::Post(message))
    }

    /// Signals that the host regained focus.
    pub fn focus(&self) -> ReplicaResult<()> {
        self.command(Command::Focus)
    }

    /// Signals that the host resumed from suspension.
    pub fn resume(&self) -> ReplicaResult<()> {
        self.command(Command::Resume)
    }

    /// Stops the driver. The session is returned from the driver task.
    pub fn shutdown(&self) -> ReplicaResult<()> {
        self.command(Command::Shutdown)
    }

    /// Returns true while the driver accepts commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

impl ActionForwarder for DriverHandle {
    fn forward(&self, message: SyncMessage) {
        if let Err(e) = self.post(message) {
            warn!(error = %e, "action dropped");
        }
    }
}

/// Runs a [`ReplicaSession`] on tokio.
pub struct ReplicaDriver<T: Transport, S: StateContainer> {
    session: ReplicaSession<T, S>,
    events: EventStream,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl<T, S> ReplicaDriver<T, S>
where
    T: Transport + 'static,
    S: StateContainer + 'static,
{
    /// Wraps a session and the event stream returned alongside it.
    pub fn new(session: ReplicaSession<T, S>, events: EventStream) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Self {
            session,
            events,
            commands: rx,
        };
        (driver, DriverHandle { commands: tx })
    }

    /// Runs until shut down or every [`DriverHandle`] is dropped, then returns
    /// the session.
    pub async fn run(mut self) -> ReplicaSession<T, S> {
        let config = self.session.config().clone();

        let mut retry = interval(config.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Skip);
        retry.tick().await;
        let mut retry_was_active = false;

        let heartbeat_period = config.heartbeat.map(|h| h.period);
        let mut heartbeat = interval(heartbeat_period.unwrap_or(config.retry_interval));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        heartbeat.tick().await;

        debug!(channel = %config.channel, "replica driver started");

        loop {
            // Re-armed timers start a full period from now.
            let retry_active = self.session.retry_active();
            if retry_active && !retry_was_active {
                retry.reset();
            }
            retry_was_active = retry_active;

            tokio::select! {
                Some(event) = self.events.recv() => self.session.handle_event(event),
                command = self.commands.recv() => match command {
                    Some(Command::Post(message)) => self.session.post_message(&message),
                    Some(Command::Focus) => self.session.focus(),
                    Some(Command::Resume) => self.session.resume(),
                    Some(Command::Shutdown) | None => break,
                },
                _ = retry.tick(), if retry_active => self.session.on_retry_tick(),
                _ = heartbeat.tick(), if heartbeat_period.is_some() => self.session.heartbeat(),
            }
        }

        info!(stats = ?self.session.stats(), "replica driver stopped");
        self.session
    }

    /// Spawns the driver on the current runtime.
    pub fn spawn(self) -> JoinHandle<ReplicaSession<T, S>> {
        tokio::spawn(self.run())
    }
}

/// A replica store backed by a spawned driver.
pub type SpawnedReplica = ReplicaStore<Arc<Store<ReplicaReducer>>, DriverHandle>;

/// Creates a replica container, initializes a session over `transport` and
/// spawns its driver.
///
/// Must be called inside a tokio runtime.
pub fn spawn_replica<T: Transport + 'static>(
    config: ReplicaConfig,
    transport: T,
) -> (
    SpawnedReplica,
    JoinHandle<ReplicaSession<T, Arc<Store<ReplicaReducer>>>>,
) {
    let inner = replica_container();
    let (mut session, events) = ReplicaSession::new(config, transport);
    session.init(Arc::clone(&inner));

    let (driver, handle) = ReplicaDriver::new(session, events);
    let task = driver.spawn();
    (ReplicaStore::new(inner, handle), task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ready::wait_until_ready;
    use crate::session::SessionState;
    use crate::transport::{LinkHandle, MockTransport};
    use serde_json::json;
    use statelink_store::Action;
    use std::time::Duration;

    fn fast_config() -> ReplicaConfig {
        ReplicaConfig::default()
            .with_retry_interval(Duration::from_millis(10))
            .without_heartbeat()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn driver_applies_snapshot_and_stops_retrying() {
        let transport = Arc::new(MockTransport::new());
        let (replica, task) = spawn_replica(fast_config(), Arc::clone(&transport));

        let handle = transport.last_handle().unwrap();
        handle.deliver(SyncMessage::snapshot(json!({"count": 9})).to_value().unwrap());

        tokio::time::timeout(Duration::from_secs(5), wait_until_ready(&replica))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replica.get_state()["count"], json!(9));

        settle().await;
        let requests = handle.sync_requests();
        settle().await;
        assert_eq!(handle.sync_requests(), requests);

        replica.forwarder().shutdown().unwrap();
        let session = task.await.unwrap();
        assert_eq!(session.state(), SessionState::Synced);
        assert!(!session.retry_active());
    }

    #[tokio::test]
    async fn driver_retries_until_answered() {
        let transport = Arc::new(MockTransport::new());
        let (replica, task) = spawn_replica(fast_config(), Arc::clone(&transport));

        settle().await;
        assert!(transport.last_handle().unwrap().sync_requests() >= 2);

        drop(replica);
        let session = task.await.unwrap();
        assert_eq!(session.state(), SessionState::AwaitingAck);
    }

    #[tokio::test]
    async fn dispatched_actions_reach_the_link() {
        let transport = Arc::new(MockTransport::new());
        let (replica, task) = spawn_replica(fast_config(), Arc::clone(&transport));

        replica.dispatch(Action::new("counter/increment"));
        settle().await;

        let sent = transport.last_handle().unwrap().sent();
        assert!(sent.contains(&SyncMessage::dispatch(json!({"type": "counter/increment"}))));

        let commands = replica.forwarder().clone();
        commands.shutdown().unwrap();
        task.await.unwrap();
        assert!(!commands.is_running());
        assert!(matches!(commands.focus(), Err(ReplicaError::DriverStopped)));
    }

    #[tokio::test]
    async fn resume_replaces_the_handle() {
        let transport = Arc::new(MockTransport::new());
        let (replica, task) = spawn_replica(fast_config(), Arc::clone(&transport));
        let first = transport.last_handle().unwrap();

        replica.forwarder().resume().unwrap();
        settle().await;

        let second = transport.last_handle().unwrap();
        assert_ne!(first.id(), second.id());
        assert!(first.is_closed());
        assert!(second.sync_requests() >= 1);

        replica.forwarder().shutdown().unwrap();
        task.await.unwrap();
    }
}
