//! Channel Selection
//!
//! Each operation kind has a fixed-priority channel plan. Channels are tried
//! one after another, never raced, and the first success ends the sequence.
//!
//! ```text
//! read:   Direct ──fails──> ScriptInject ──fails──> Exhausted
//!            │                   │
//!            └──ok──> Success    └──ok──> Success
//!
//! write:  Direct ──fails──> FormSubmit ──hand-off fails──> Exhausted
//!            │                   │
//!            └──ok──> Success    └──handed off──> Success (acknowledged)
//! ```
//!
//! Every attempt is recorded so callers can see which channel answered and
//! why earlier ones were skipped.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::action::{Operation, OperationKind};
use crate::channel::{Channel, ChannelKind, FailureCause, TransportFailure};
use crate::endpoint::Endpoint;
use crate::envelope::Envelope;

// ============================================================================
// Channel Plan
// ============================================================================

/// Ordered channels for one operation kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelPlan {
    /// Operation kind the plan serves
    pub kind: OperationKind,
    /// Channels in priority order
    pub order: Vec<ChannelKind>,
}

impl ChannelPlan {
    /// Plan for an operation kind
    #[must_use]
    pub fn for_kind(kind: OperationKind) -> Self {
        let order = match kind {
            OperationKind::Read => vec![ChannelKind::Direct, ChannelKind::ScriptInject],
            OperationKind::Write => vec![ChannelKind::Direct, ChannelKind::FormSubmit],
        };
        Self { kind, order }
    }

    /// Channel tried after `current`, if any
    #[must_use]
    pub fn next_after(&self, current: ChannelKind) -> Option<ChannelKind> {
        let pos = self.order.iter().position(|c| *c == current)?;
        self.order.get(pos + 1).copied()
    }

    /// Number of channels in the plan
    #[must_use]
    pub fn depth(&self) -> usize {
        self.order.len()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// One attempt over one channel
#[derive(Clone, Debug, PartialEq)]
pub struct AttemptRecord {
    /// Channel that was tried
    pub channel: ChannelKind,
    /// When the attempt began
    pub started_at: DateTime<Utc>,
    /// Successful envelope, or why the channel failed
    pub outcome: Result<Envelope, TransportFailure>,
}

impl AttemptRecord {
    /// Whether this attempt succeeded
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Result of running a channel plan
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// A channel succeeded
    Success {
        /// The successful envelope
        envelope: Envelope,
        /// Every attempt made, the successful one last
        attempts: Vec<AttemptRecord>,
    },
    /// Every channel in the plan failed
    Exhausted {
        /// Failure of the last channel tried
        last: TransportFailure,
        /// Every attempt made
        attempts: Vec<AttemptRecord>,
    },
}

impl Resolution {
    /// Attempts made, in order
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Success { attempts, .. } | Self::Exhausted { attempts, .. } => attempts,
        }
    }

    /// Channel that produced the success, if any
    #[must_use]
    pub fn answered_by(&self) -> Option<ChannelKind> {
        match self {
            Self::Success { attempts, .. } => attempts.last().map(|a| a.channel),
            Self::Exhausted { .. } => None,
        }
    }

    /// Whether a channel succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ============================================================================
// Selector
// ============================================================================

/// Runs channel plans over a set of registered channels
#[derive(Clone, Default)]
pub struct ChannelSelector {
    channels: HashMap<ChannelKind, Arc<dyn Channel>>,
}

impl ChannelSelector {
    /// Create a selector with no channels
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its own kind, replacing any previous one
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    /// Whether a channel of `kind` is registered
    #[must_use]
    pub fn has(&self, kind: ChannelKind) -> bool {
        self.channels.contains_key(&kind)
    }

    /// Registered channels, in no particular order
    pub fn channels(&self) -> impl Iterator<Item = &Arc<dyn Channel>> + '_ {
        self.channels.values()
    }

    /// Deliver `operation` following its kind's plan
    pub async fn run(&self, endpoint: &Endpoint, operation: &Operation) -> Resolution {
        self.run_with(endpoint, operation, |_, _| {}).await
    }

    /// Like [`run`](Self::run), calling `on_fallback` with each failure that
    /// is followed by another registered channel
    pub async fn run_with<F>(
        &self,
        endpoint: &Endpoint,
        operation: &Operation,
        mut on_fallback: F,
    ) -> Resolution
    where
        F: FnMut(&TransportFailure, ChannelKind) + Send,
    {
        let plan = ChannelPlan::for_kind(operation.kind());
        let mut attempts = Vec::with_capacity(plan.depth());
        let mut last = None;

        for kind in &plan.order {
            let Some(channel) = self.channels.get(kind) else {
                debug!(channel = %kind, "channel not registered, skipping");
                continue;
            };

            let started_at = Utc::now();
            let outcome = channel
                .attempt(endpoint, operation)
                .await
                .and_then(|envelope| ensure_success(*kind, envelope));
            match outcome {
                Ok(envelope) => {
                    debug!(action = %operation.action(), channel = %kind, "attempt succeeded");
                    attempts.push(AttemptRecord {
                        channel: *kind,
                        started_at,
                        outcome: Ok(envelope.clone()),
                    });
                    return Resolution::Success { envelope, attempts };
                }
                Err(failure) => {
                    match plan.next_after(*kind) {
                        Some(next) => {
                            warn!(
                                action = %operation.action(),
                                channel = %kind,
                                next = %next,
                                error = %failure,
                                "channel failed, falling back"
                            );
                            if self.has(next) {
                                on_fallback(&failure, next);
                            }
                        }
                        None => error!(
                            action = %operation.action(),
                            channel = %kind,
                            error = %failure,
                            "last channel failed"
                        ),
                    }
                    attempts.push(AttemptRecord {
                        channel: *kind,
                        started_at,
                        outcome: Err(failure.clone()),
                    });
                    last = Some(failure);
                }
            }
        }

        let last = last.unwrap_or_else(|| {
            TransportFailure::new(
                plan.order.last().copied().unwrap_or(ChannelKind::Direct),
                FailureCause::Network("no channel registered".to_string()),
            )
        });
        Resolution::Exhausted { last, attempts }
    }
}

/// A channel that answers `Ok` with a failed envelope still failed
fn ensure_success(channel: ChannelKind, envelope: Envelope) -> Result<Envelope, TransportFailure> {
    if envelope.success() {
        Ok(envelope)
    } else {
        let message = envelope.error().unwrap_or_default().to_string();
        Err(TransportFailure::new(channel, FailureCause::Remote(message)))
    }
}

impl std::fmt::Debug for ChannelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<String> = self.channels.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("ChannelSelector").field("channels", &kinds).finish()
    }
}
