//! Connector Test Utilities
//!
//! Scripted channels and a recording status sink, so selector and façade
//! behaviour can be tested without a network.
//!
//! ```ignore
//! let direct = MockChannel::new(ChannelKind::Direct, vec![Scripted::fail(FailureCause::Http { status: 500 })]);
//! let form = MockChannel::new(ChannelKind::FormSubmit, vec![Scripted::acknowledged()]);
//! // ... run an operation ...
//! assert_eq!(form.calls(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::action::Operation;
use crate::channel::{Channel, ChannelKind, FailureCause, TransportFailure};
use crate::endpoint::Endpoint;
use crate::envelope::{DeliveryMode, Envelope, FormReceipt};
use crate::status::StatusSink;

// ============================================================================
// Scripted Channel
// ============================================================================

/// One pre-programmed attempt outcome
#[derive(Clone, Debug)]
pub enum Scripted {
    /// Succeed with this envelope
    Ok(Envelope),
    /// Fail with this cause
    Fail(FailureCause),
}

impl Scripted {
    /// Confirmed success carrying `data`
    pub fn ok(data: Value) -> Self {
        Self::Ok(Envelope::ok(data))
    }

    /// Failure with `cause`
    pub fn fail(cause: FailureCause) -> Self {
        Self::Fail(cause)
    }

    /// Blind form hand-off
    pub fn acknowledged() -> Self {
        let receipt = FormReceipt::new("mock", DeliveryMode::FormSubmit, "2026-01-01T00:00:00.000Z");
        Self::Ok(Envelope::acknowledged(&receipt))
    }
}

/// Channel answering from a script of outcomes
#[derive(Debug)]
pub struct MockChannel {
    kind: ChannelKind,
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<Operation>>,
    endpoints: Mutex<Vec<Endpoint>>,
    last: Mutex<Option<Envelope>>,
}

impl MockChannel {
    /// Create a channel that plays `script` in order
    ///
    /// Once the script runs out every attempt fails with a network error.
    pub fn new(kind: ChannelKind, script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
            endpoints: Mutex::new(Vec::new()),
            last: Mutex::new(None),
        })
    }

    /// Number of attempts made
    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    /// Operations attempted, in order
    pub fn operations(&self) -> Vec<Operation> {
        self.seen.lock().clone()
    }

    /// Endpoints attempted, in order
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.lock().clone()
    }

    /// Envelope returned by the most recent successful attempt
    pub fn last_outcome(&self) -> Option<Envelope> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn attempt(
        &self,
        endpoint: &Endpoint,
        operation: &Operation,
    ) -> Result<Envelope, TransportFailure> {
        self.seen.lock().push(operation.clone());
        self.endpoints.lock().push(endpoint.clone());

        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Ok(envelope)) => {
                *self.last.lock() = Some(envelope.clone());
                Ok(envelope)
            }
            Some(Scripted::Fail(cause)) => Err(TransportFailure::new(self.kind, cause)),
            None => Err(TransportFailure::new(
                self.kind,
                FailureCause::Network("mock script exhausted".into()),
            )),
        }
    }
}

// ============================================================================
// Recording Status Sink
// ============================================================================

/// Status sink that remembers everything it was told
#[derive(Debug, Default)]
pub struct RecordingStatus {
    events: Mutex<Vec<StatusEvent>>,
}

/// A recorded status call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusEvent {
    /// `report(message)`
    Report(String),
    /// `clear()`
    Clear,
}

impl RecordingStatus {
    /// Create an empty recorder
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything recorded, in order
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().clone()
    }

    /// Reported messages only
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Report(m) => Some(m.clone()),
                StatusEvent::Clear => None,
            })
            .collect()
    }
}

impl StatusSink for RecordingStatus {
    fn report(&self, message: &str) {
        self.events.lock().push(StatusEvent::Report(message.to_string()));
    }

    fn clear(&self) {
        self.events.lock().push(StatusEvent::Clear);
    }
}

/// Status sink that panics on every call
///
/// Proves callers isolate themselves from a misbehaving observer.
#[derive(Debug, Default)]
pub struct PanickingStatus;

impl StatusSink for PanickingStatus {
    fn report(&self, message: &str) {
        panic!("status observer exploded on {message:?}");
    }

    fn clear(&self) {
        panic!("status observer exploded on clear");
    }
}
