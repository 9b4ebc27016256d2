//! Primary configuration.

use statelink_protocol::SyncMessage;

/// Default channel name shared by primary and replicas.
pub const DEFAULT_CHANNEL: &str = "statelink";

/// Configuration for the primary side.
#[derive(Debug, Clone)]
pub struct PrimaryConfig {
    /// Links announcing any other channel name are refused.
    pub channel: String,
    /// Maximum number of registered links.
    pub max_links: usize,
}

impl PrimaryConfig {
    /// Creates a configuration for the given channel.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            max_links: 1000,
        }
    }

    /// Sets the maximum number of registered links.
    pub fn with_max_links(mut self, max: usize) -> Self {
        self.max_links = max;
        self
    }

    /// Returns true if a message kind is one the primary acts on.
    pub fn accepts(&self, message: &SyncMessage) -> bool {
        !matches!(message, SyncMessage::PatchState { .. })
    }
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL)
    }
}
