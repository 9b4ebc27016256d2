//! Configuration for replica sessions.

use std::time::Duration;

/// Default channel name shared by primary and replicas.
pub const DEFAULT_CHANNEL: &str = "statelink";

/// Configuration for a replica session.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// Channel name announced when opening a link.
    pub channel: String,
    /// Period of the full-sync retry timer.
    ///
    /// Fixed interval, no backoff.
    pub retry_interval: Duration,
    /// Liveness checking. `None` disables it.
    pub heartbeat: Option<HeartbeatConfig>,
    /// Whether regaining focus forces a resync.
    pub resync_on_focus: bool,
}

impl ReplicaConfig {
    /// Creates a configuration for the given channel.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            retry_interval: Duration::from_millis(500),
            heartbeat: Some(HeartbeatConfig::default()),
            resync_on_focus: true,
        }
    }

    /// Sets the retry interval.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the heartbeat configuration.
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Disables the heartbeat.
    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat = None;
        self
    }

    /// Sets whether focus regain forces a resync.
    pub fn with_resync_on_focus(mut self, enabled: bool) -> Self {
        self.resync_on_focus = enabled;
        self
    }
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL)
    }
}

/// Configuration for the liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// How often the liveness check runs.
    pub period: Duration,
    /// Silence longer than this triggers a resync.
    pub resync_threshold: Duration,
}

impl HeartbeatConfig {
    /// Creates a heartbeat configuration.
    pub fn new(period: Duration, resync_threshold: Duration) -> Self {
        Self {
            period,
            resync_threshold,
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(5))
    }
}
