//! Crate-level error types

use crate::relay::RelayError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the relay and its host collaborator
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A call into the host media server failed
    #[error("host call `{operation}` failed: {reason}")]
    Host {
        /// Host operation that failed (e.g. "publish")
        operation: &'static str,
        /// Reason reported by the host
        reason: String,
    },

    /// A configuration property could not be parsed
    #[error("invalid value for property {key}: {value:?}")]
    InvalidProperty {
        /// Fully-qualified property key
        key: String,
        /// Raw value that failed to parse
        value: String,
    },

    /// A relay attempt for a source stream failed
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl Error {
    /// Convenience constructor for host failures
    pub fn host(operation: &'static str, reason: impl Into<String>) -> Self {
        Error::Host {
            operation,
            reason: reason.into(),
        }
    }
}
