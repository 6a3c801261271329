//! Connector Errors
//!
//! What callers of the façade see. Transport detail is folded into the
//! operation-prefixed message `GAS error (<operation>): <cause>`; the
//! structured failure stays available for callers that want to branch on it.

use thiserror::Error;

use crate::channel::{FailureCause, TransportFailure};

/// Broad classification of a connector error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No usable endpoint or client
    Configuration,
    /// Request never produced a usable answer
    Transport,
    /// Backend answered `success: false`
    RemoteApplication,
    /// Backend answered something that is not an envelope
    Parse,
}

/// Error returned by connector operations
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Nothing to send the request to
    #[error("GAS error ({operation}): GAS URL is not configured")]
    MissingEndpoint {
        /// Wire name of the operation
        operation: String,
    },

    /// The HTTP client could not be built
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// Every channel for the operation failed
    #[error("GAS error ({operation}): {failure}")]
    Exhausted {
        /// Wire name of the operation
        operation: String,
        /// Failure of the last channel tried
        failure: TransportFailure,
    },
}

impl ConnectorError {
    /// Classification of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingEndpoint { .. } | Self::Client(_) => ErrorKind::Configuration,
            Self::Exhausted { failure, .. } => match failure.cause {
                FailureCause::InvalidEndpoint { .. } => ErrorKind::Configuration,
                FailureCause::Remote(_) => ErrorKind::RemoteApplication,
                FailureCause::Parse(_) => ErrorKind::Parse,
                _ => ErrorKind::Transport,
            },
        }
    }

    /// Operation this error belongs to, if any
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::MissingEndpoint { operation } | Self::Exhausted { operation, .. } => {
                Some(operation)
            }
            Self::Client(_) => None,
        }
    }

    /// The last channel failure, for exhausted operations
    #[must_use]
    pub fn failure(&self) -> Option<&TransportFailure> {
        match self {
            Self::Exhausted { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Result alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;
