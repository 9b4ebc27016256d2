//! Error types for the replica side.

use statelink_protocol::ProtocolError;
use thiserror::Error;

/// Result type for replica operations.
pub type ReplicaResult<T> = Result<T, ReplicaError>;

/// Errors that can occur on the replica side.
///
/// Everything except [`ReplicaError::NotAReplica`] is absorbed by the session;
/// only misuse crosses the subsystem boundary.
#[derive(Error, Debug)]
pub enum ReplicaError {
    /// Transport failure (open or send).
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// No transport handle is open.
    #[error("not connected to primary")]
    NotConnected,

    /// A replica-only predicate was used on a store without the sync marker.
    #[error("store is not a replica")]
    NotAReplica,

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The session driver has shut down.
    #[error("session driver stopped")]
    DriverStopped,
}

impl ReplicaError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReplicaError::Transport { retryable, .. } => *retryable,
            ReplicaError::NotConnected => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ReplicaError::transport_retryable("port closed").is_retryable());
        assert!(!ReplicaError::transport_fatal("no such channel").is_retryable());
        assert!(ReplicaError::NotConnected.is_retryable());
        assert!(!ReplicaError::NotAReplica.is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            ReplicaError::NotConnected.to_string(),
            "not connected to primary"
        );
        let err = ReplicaError::from(ProtocolError::InvalidMessage("bad".into()));
        assert!(err.to_string().contains("bad"));
    }
}
