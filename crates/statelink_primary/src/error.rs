//! Error types for the primary side.

use crate::link::LinkId;
use statelink_protocol::ProtocolError;
use thiserror::Error;

/// Result type for primary operations.
pub type PrimaryResult<T> = Result<T, PrimaryError>;

/// Errors that can occur on the primary side.
#[derive(Error, Debug)]
pub enum PrimaryError {
    /// Sending on a link failed.
    #[error("transport error on {link}: {message}")]
    Transport {
        /// The link.
        link: LinkId,
        /// Error message.
        message: String,
    },

    /// No link with this id is registered.
    #[error("unknown link: {0}")]
    UnknownLink(LinkId),

    /// A link announced a different channel name.
    #[error("channel mismatch: expected {expected:?}, got {actual:?}")]
    ChannelMismatch {
        /// Configured channel.
        expected: String,
        /// Channel the link announced.
        actual: String,
    },

    /// The link limit was reached.
    #[error("too many links: limit is {0}")]
    TooManyLinks(usize),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl PrimaryError {
    /// Returns true if the error was caused by a link rather than the primary.
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            PrimaryError::Transport { .. }
                | PrimaryError::ChannelMismatch { .. }
                | PrimaryError::Protocol(_)
        )
    }
}
