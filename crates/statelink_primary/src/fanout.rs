//! Link registry and patch broadcast.

use crate::config::PrimaryConfig;
use crate::error::{PrimaryError, PrimaryResult};
use crate::link::{LinkId, PrimaryLink};
use parking_lot::{Mutex, RwLock};
use statelink_protocol::{Edit, SyncMessage};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Statistics about broadcasts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutStats {
    /// Non-empty batches broadcast.
    pub broadcasts: u64,
    /// Messages delivered to links, broadcasts and replies together.
    pub messages_sent: u64,
    /// Sends that failed.
    pub send_failures: u64,
    /// Links registered over the lifetime of the registry.
    pub links_connected: u64,
    /// Links removed over the lifetime of the registry.
    pub links_disconnected: u64,
}

/// The set of open replica links.
///
/// Links stay registered until [`Fanout::disconnect`] is called; a failed
/// send is logged and does not remove the link.
pub struct Fanout {
    config: PrimaryConfig,
    links: RwLock<Vec<Arc<dyn PrimaryLink>>>,
    stats: Mutex<FanoutStats>,
}

impl Fanout {
    /// Creates an empty registry.
    pub fn new(config: PrimaryConfig) -> Self {
        Self {
            config,
            links: RwLock::new(Vec::new()),
            stats: Mutex::new(FanoutStats::default()),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &PrimaryConfig {
        &self.config
    }

    /// Registers a link.
    ///
    /// Returns `Ok(false)` if a link with the same id is already registered.
    pub fn connect(&self, link: Arc<dyn PrimaryLink>) -> PrimaryResult<bool> {
        if link.name() != self.config.channel {
            debug!(link = %link.id(), name = link.name(), "ignoring link on foreign channel");
            return Err(PrimaryError::ChannelMismatch {
                expected: self.config.channel.clone(),
                actual: link.name().to_string(),
            });
        }

        let mut links = self.links.write();
        if links.iter().any(|l| l.id() == link.id()) {
            return Ok(false);
        }
        if links.len() >= self.config.max_links {
            warn!(limit = self.config.max_links, "link limit reached");
            return Err(PrimaryError::TooManyLinks(self.config.max_links));
        }

        debug!(link = %link.id(), "link connected");
        links.push(link);
        self.stats.lock().links_connected += 1;
        Ok(true)
    }

    /// Removes a link. Returns false if it was not registered.
    pub fn disconnect(&self, id: LinkId) -> bool {
        let mut links = self.links.write();
        let before = links.len();
        links.retain(|l| l.id() != id);
        let removed = links.len() != before;
        drop(links);

        if removed {
            debug!(link = %id, "link disconnected");
            self.stats.lock().links_disconnected += 1;
        }
        removed
    }

    /// Sends one `PATCH_STATE` message carrying `edits` to every link.
    ///
    /// An empty batch sends nothing. Returns the number of links that
    /// accepted the message.
    pub fn submit_patches(&self, edits: Vec<Edit>) -> usize {
        if edits.is_empty() {
            return 0;
        }

        let message = SyncMessage::patch(edits);
        let links = self.links();
        let mut delivered = 0;
        let mut failures = 0;

        for link in &links {
            match link.send(&message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(link = %link.id(), error = %e, "patch broadcast failed");
                    failures += 1;
                }
            }
        }

        trace!(links = links.len(), delivered, "patch broadcast");
        let mut stats = self.stats.lock();
        stats.broadcasts += 1;
        stats.messages_sent += delivered as u64;
        stats.send_failures += failures;
        delivered
    }

    /// Sends a message to one link.
    pub fn reply(&self, id: LinkId, message: &SyncMessage) -> PrimaryResult<()> {
        let link = self
            .links
            .read()
            .iter()
            .find(|l| l.id() == id)
            .cloned()
            .ok_or(PrimaryError::UnknownLink(id))?;

        let result = link.send(message);
        let mut stats = self.stats.lock();
        match &result {
            Ok(()) => stats.messages_sent += 1,
            Err(_) => stats.send_failures += 1,
        }
        result
    }

    /// Returns true if a link with `id` is registered.
    pub fn contains(&self, id: LinkId) -> bool {
        self.links.read().iter().any(|l| l.id() == id)
    }

    /// Number of registered links.
    pub fn link_count(&self) -> usize {
        self.links.read().len()
    }

    /// Ids of the registered links, in registration order.
    pub fn link_ids(&self) -> Vec<LinkId> {
        self.links.read().iter().map(|l| l.id()).collect()
    }

    /// Statistics.
    pub fn stats(&self) -> FanoutStats {
        self.stats.lock().clone()
    }

    fn links(&self) -> Vec<Arc<dyn PrimaryLink>> {
        self.links.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockLink;
    use serde_json::json;

    fn fanout() -> Fanout {
        Fanout::new(PrimaryConfig::default())
    }

    fn edits() -> Vec<Edit> {
        vec![Edit::replace(vec!["count".into()], json!(1))]
    }

    #[test]
    fn connect_is_idempotent_per_id() {
        let fanout = fanout();
        let link = Arc::new(MockLink::new(1, "statelink"));
        assert!(fanout.connect(link.clone()).unwrap());
        assert!(!fanout.connect(link).unwrap());
        assert_eq!(fanout.link_count(), 1);
        assert_eq!(fanout.stats().links_connected, 1);
    }

    #[test]
    fn foreign_channel_is_refused() {
        let fanout = fanout();
        let err = fanout
            .connect(Arc::new(MockLink::new(1, "devtools")))
            .unwrap_err();
        assert!(matches!(err, PrimaryError::ChannelMismatch { .. }));
        assert_eq!(fanout.link_count(), 0);
    }

    #[test]
    fn link_limit() {
        let fanout = Fanout::new(PrimaryConfig::default().with_max_links(1));
        fanout
            .connect(Arc::new(MockLink::new(1, "statelink")))
            .unwrap();
        assert!(matches!(
            fanout.connect(Arc::new(MockLink::new(2, "statelink"))),
            Err(PrimaryError::TooManyLinks(1))
        ));
    }

    #[test]
    fn broadcast_reaches_every_link_once() {
        let fanout = fanout();
        let a = Arc::new(MockLink::new(1, "statelink"));
        let b = Arc::new(MockLink::new(2, "statelink"));
        fanout.connect(a.clone()).unwrap();
        fanout.connect(b.clone()).unwrap();

        assert_eq!(fanout.submit_patches(edits()), 2);
        assert_eq!(a.sent(), vec![SyncMessage::patch(edits())]);
        assert_eq!(a.sent(), b.sent());
    }

    #[test]
    fn empty_batch_is_not_sent() {
        let fanout = fanout();
        let a = Arc::new(MockLink::new(1, "statelink"));
        fanout.connect(a.clone()).unwrap();
        assert_eq!(fanout.submit_patches(vec![]), 0);
        assert!(a.sent().is_empty());
        assert_eq!(fanout.stats().broadcasts, 0);
    }

    #[test]
    fn failing_link_does_not_block_others() {
        let fanout = fanout();
        let bad = Arc::new(MockLink::new(1, "statelink"));
        let good = Arc::new(MockLink::new(2, "statelink"));
        bad.set_fail(true);
        fanout.connect(bad).unwrap();
        fanout.connect(good.clone()).unwrap();

        assert_eq!(fanout.submit_patches(edits()), 1);
        assert_eq!(good.sent().len(), 1);
        assert_eq!(fanout.stats().send_failures, 1);
        assert_eq!(fanout.link_count(), 2);
    }

    #[test]
    fn disconnected_links_receive_nothing() {
        let fanout = fanout();
        let a = Arc::new(MockLink::new(1, "statelink"));
        fanout.connect(a.clone()).unwrap();
        assert!(fanout.disconnect(LinkId(1)));
        assert!(!fanout.disconnect(LinkId(1)));

        fanout.submit_patches(edits());
        assert!(a.sent().is_empty());
        assert_eq!(fanout.stats().links_disconnected, 1);
    }

    #[test]
    fn reply_targets_one_link() {
        let fanout = fanout();
        let a = Arc::new(MockLink::new(1, "statelink"));
        let b = Arc::new(MockLink::new(2, "statelink"));
        fanout.connect(a.clone()).unwrap();
        fanout.connect(b.clone()).unwrap();

        let snapshot = SyncMessage::snapshot(json!({"count": 1}));
        fanout.reply(LinkId(2), &snapshot).unwrap();
        assert!(a.sent().is_empty());
        assert_eq!(b.sent(), vec![snapshot.clone()]);

        assert!(matches!(
            fanout.reply(LinkId(9), &snapshot),
            Err(PrimaryError::UnknownLink(LinkId(9)))
        ));
    }
}
