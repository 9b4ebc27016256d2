//! Connections from the primary to its replicas.

use crate::error::{PrimaryError, PrimaryResult};
use parking_lot::Mutex;
use statelink_protocol::SyncMessage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifies a replica link on the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// The primary's end of one replica link.
pub trait PrimaryLink: Send + Sync {
    /// Returns the link's identity.
    fn id(&self) -> LinkId;

    /// Channel name the replica announced.
    fn name(&self) -> &str;

    /// Sends a message to the replica.
    ///
    /// Must not dispatch into the primary store synchronously.
    fn send(&self, message: &SyncMessage) -> PrimaryResult<()>;
}

/// A link that records what it was sent.
#[derive(Debug)]
pub struct MockLink {
    id: LinkId,
    name: String,
    sent: Mutex<Vec<SyncMessage>>,
    fail: AtomicBool,
}

impl MockLink {
    /// Creates a link announcing `name`.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: LinkId(id),
            name: name.into(),
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Messages received so far.
    pub fn sent(&self) -> Vec<SyncMessage> {
        self.sent.lock().clone()
    }

    /// Forgets recorded messages.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Makes sends fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl PrimaryLink for MockLink {
    fn id(&self) -> LinkId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: &SyncMessage) -> PrimaryResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PrimaryError::Transport {
                link: self.id,
                message: "mock send failure".into(),
            });
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_link_records_and_fails() {
        let link = MockLink::new(4, "statelink");
        assert_eq!(link.id(), LinkId(4));
        assert_eq!(link.name(), "statelink");

        link.send(&SyncMessage::sync_request()).unwrap();
        assert_eq!(link.sent().len(), 1);

        link.set_fail(true);
        assert!(matches!(
            link.send(&SyncMessage::sync_request()),
            Err(PrimaryError::Transport { .. })
        ));
        link.clear();
        assert!(link.sent().is_empty());
    }
}
