//! Delivery Channels
//!
//! One channel is one concrete way of getting an [`Operation`] to the backend
//! script:
//!
//! - **Direct**: a plain cross-origin request (`GET ?action=` for reads,
//!   form-encoded `POST` for writes). Observes the response.
//! - **Script inject**: a JSONP-style read. The backend answers with a script
//!   that calls a named callback; the callback carries the envelope.
//! - **Form submit**: a blind form post for writes. Cannot observe the
//!   response, so success only means "handed off".
//!
//! Channels never decide what happens after a failure; the
//! [`ChannelSelector`](crate::selector::ChannelSelector) owns the order.

mod callbacks;
mod direct;
mod form_submit;
mod script_inject;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{Operation, OperationKind};
use crate::endpoint::{Endpoint, EndpointError};
use crate::envelope::Envelope;

pub use callbacks::{CallbackRegistry, CallbackSlot, ScriptCallback};
pub use direct::DirectChannel;
pub use form_submit::{FormSubmitChannel, FormTarget, FORM_CONTENT_TYPE, WRITE_FIELD};
pub use script_inject::{
    HttpScriptLoader, ScriptInjectChannel, ScriptLoader, DEFAULT_SCRIPT_TIMEOUT,
};

// ============================================================================
// Channel Kind
// ============================================================================

/// Identifies a channel strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Plain request
    Direct,
    /// JSONP read
    ScriptInject,
    /// Blind form post
    FormSubmit,
}

impl ChannelKind {
    /// Whether the channel may carry operations of `kind`
    #[must_use]
    pub fn carries(self, kind: OperationKind) -> bool {
        match self {
            Self::Direct => true,
            Self::ScriptInject => kind == OperationKind::Read,
            Self::FormSubmit => kind == OperationKind::Write,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::ScriptInject => write!(f, "script-inject"),
            Self::FormSubmit => write!(f, "form-submit"),
        }
    }
}

// ============================================================================
// Failures
// ============================================================================

/// Why a single attempt failed
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FailureCause {
    /// Non-2xx status
    #[error("HTTP error: {status}")]
    Http {
        /// Status code
        status: u16,
    },
    /// Request never produced a response
    #[error("network error: {0}")]
    Network(String),
    /// No answer within the channel's deadline
    #[error("timed out after {}ms", .after.as_millis())]
    Timeout {
        /// The deadline that elapsed
        after: Duration,
    },
    /// Body was not valid JSON
    #[error("{0}")]
    Parse(String),
    /// Backend answered `success: false`
    #[error("{0}")]
    Remote(String),
    /// JSONP script could not be loaded
    #[error("script load error: {0}")]
    ScriptLoad(String),
    /// Blind submission could not be handed off
    #[error("form submission failed: {0}")]
    Submission(String),
    /// Endpoint is not an absolute URL
    #[error("invalid endpoint {url:?}: {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint
        url: String,
        /// Why it did not parse
        reason: url::ParseError,
    },
    /// Channel asked to carry an operation it cannot carry
    #[error("{channel} channel cannot carry {kind:?} operations")]
    Unsupported {
        /// The channel
        channel: ChannelKind,
        /// The rejected operation kind
        kind: OperationKind,
    },
}

impl FailureCause {
    /// Map a reqwest error onto a cause
    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { after: timeout }
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<EndpointError> for FailureCause {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::InvalidUrl { url, source } => Self::InvalidEndpoint {
                url,
                reason: source,
            },
            other @ EndpointError::Io { .. } => Self::Network(other.to_string()),
        }
    }
}

/// A failed attempt over one channel
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct TransportFailure {
    /// Channel that failed
    pub channel: ChannelKind,
    /// What went wrong
    pub cause: FailureCause,
}

impl TransportFailure {
    /// Create a failure
    pub fn new(channel: ChannelKind, cause: FailureCause) -> Self {
        Self { channel, cause }
    }
}

// ============================================================================
// Channel Trait
// ============================================================================

/// One delivery strategy
///
/// `attempt` performs exactly one try and returns a successful envelope or a
/// failure. Transient resources created for the attempt must be released
/// before it returns, and also when the future is dropped mid-flight. Work
/// an attempt deliberately leaves running is reported by `pending` and
/// awaited by `drain`.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Which strategy this is
    fn kind(&self) -> ChannelKind;

    /// Deliver `operation` to `endpoint`
    async fn attempt(
        &self,
        endpoint: &Endpoint,
        operation: &Operation,
    ) -> Result<Envelope, TransportFailure>;

    /// Detached work from earlier attempts that has not finished
    fn pending(&self) -> usize {
        0
    }

    /// Wait until no detached work remains
    async fn drain(&self) {}
}

/// Reject operations a channel cannot carry
pub(crate) fn ensure_carries(
    channel: ChannelKind,
    operation: &Operation,
) -> Result<(), TransportFailure> {
    if channel.carries(operation.kind()) {
        Ok(())
    } else {
        Err(TransportFailure::new(
            channel,
            FailureCause::Unsupported {
                channel,
                kind: operation.kind(),
            },
        ))
    }
}

/// Wire envelope for writes: `{action, data, timestamp}`
pub(crate) fn write_envelope(operation: &Operation, timestamp: &str) -> serde_json::Value {
    serde_json::json!({
        "action": operation.name(),
        "data": operation.payload(),
        "timestamp": timestamp,
    })
}

/// ISO-8601 timestamp with millisecond precision
pub(crate) fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
