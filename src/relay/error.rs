//! Relay error types
//!
//! Failures that end one relay attempt for a single source stream. None of
//! these escape the engine's entry points; they decide the termination
//! reason and whether a restart is scheduled.

use crate::host::StreamId;

/// Error type for relay attempts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Stream name never resolved while the delay buffer filled up
    #[error("stream {stream} name missing for too long ({buffered} packets buffered)")]
    BufferOverflow {
        /// Source stream that overflowed
        stream: StreamId,
        /// Packets discarded with the buffer
        buffered: usize,
    },

    /// Destination stream name already in use on the target
    #[error("target stream already exists: {destination}")]
    DestinationCollision {
        /// Destination name that collided
        destination: String,
    },

    /// A host publish/forward call failed
    #[error("host call failed: {0}")]
    HostCall(String),
}

impl From<crate::error::Error> for RelayError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Relay(inner) => inner,
            other => RelayError::HostCall(other.to_string()),
        }
    }
}
