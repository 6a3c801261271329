//! Sheets Connector
//!
//! The operation façade. Every named operation follows the same path:
//!
//! ```text
//! resolve endpoint ──empty──> ConnectorError::MissingEndpoint
//!        │
//!        v
//! build Operation (action + payload)
//!        │
//!        v
//! ChannelSelector::run ──Exhausted──> ConnectorError::Exhausted
//!        │                            "GAS error (<op>): <cause>"
//!        v
//! Delivery::Confirmed(data) | Delivery::AcknowledgedNotConfirmed(receipt)
//! ```
//!
//! Progress goes to the status sink on the side: once when an operation
//! starts, once per fallback to the next channel, and once at the end. A
//! sink that misbehaves (even one that panics) never changes an operation's
//! result.
//!
//! Blind writes keep running after their operation returns. [`flush`]
//! waits for them; a process should call it before exiting.
//!
//! [`flush`]: SheetsConnector::flush

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::action::{Action, Operation, Payload};
use crate::channel::{
    ChannelKind, DirectChannel, FailureCause, FormSubmitChannel, HttpScriptLoader,
    ScriptInjectChannel, TransportFailure,
};
use crate::config::ConnectorConfig;
use crate::endpoint::{EndpointResolver, OverrideStore};
use crate::envelope::{Delivery, FALLBACK_ERROR};
use crate::error::{ConnectorError, Result};
use crate::selector::{ChannelSelector, Resolution};
use crate::status::{SilentStatus, StatusSink};

/// Probe message for a reachable backend
pub const PROBE_OK: &str = "GAS接続成功";

/// Probe message for an unreachable backend
pub const PROBE_FAILED: &str = "GAS接続失敗";

/// Outcome of [`SheetsConnector::test_connection`]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectionProbe {
    /// Whether statistics could be fetched
    pub success: bool,
    /// [`PROBE_OK`] or [`PROBE_FAILED`]
    pub message: String,
    /// Statistics, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error text, on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SheetsConnector`]
pub struct SheetsConnectorBuilder {
    resolver: EndpointResolver,
    selector: ChannelSelector,
    status: Arc<dyn StatusSink>,
}

impl SheetsConnectorBuilder {
    /// Start from a resolver with no channels and a silent status sink
    #[must_use]
    pub fn new(resolver: EndpointResolver) -> Self {
        Self {
            resolver,
            selector: ChannelSelector::new(),
            status: Arc::new(SilentStatus),
        }
    }

    /// Register a channel
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn crate::channel::Channel>) -> Self {
        self.selector = self.selector.with_channel(channel);
        self
    }

    /// Use a status sink
    #[must_use]
    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> SheetsConnector {
        for kind in [ChannelKind::Direct, ChannelKind::ScriptInject, ChannelKind::FormSubmit] {
            if !self.selector.has(kind) {
                debug!(channel = %kind, "connector built without channel");
            }
        }
        SheetsConnector {
            resolver: self.resolver,
            selector: self.selector,
            status: self.status,
        }
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Named backend operations over the multi-channel transport
#[derive(Clone)]
pub struct SheetsConnector {
    resolver: EndpointResolver,
    selector: ChannelSelector,
    status: Arc<dyn StatusSink>,
}

impl SheetsConnector {
    /// Start building a connector
    #[must_use]
    pub fn builder(resolver: EndpointResolver) -> SheetsConnectorBuilder {
        SheetsConnectorBuilder::new(resolver)
    }

    /// Connector with the stock HTTP channels
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Client`] if the HTTP client cannot be built.
    pub fn from_config(
        config: &ConnectorConfig,
        overrides: Arc<dyn OverrideStore>,
        status: Arc<dyn StatusSink>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("sheetlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConnectorError::Client(e.to_string()))?;

        let direct = DirectChannel::with_client(http_client.clone(), config.request_timeout);
        let script = ScriptInjectChannel::new(
            Arc::new(HttpScriptLoader::new(http_client.clone())),
            config.script_timeout,
        );
        let form = FormSubmitChannel::new(http_client, config.form_target, config.request_timeout);

        let catalogue: Vec<&str> = config.sheets.iter().map(|(_, name)| name).collect();
        info!(
            default_endpoint = %config.gas_url,
            form_target = ?config.form_target,
            spreadsheet_id = %config.spreadsheet_id,
            "connector ready"
        );
        debug!(sheets = ?catalogue, "sheet catalogue");

        Ok(Self::builder(EndpointResolver::new(overrides, config.gas_url.clone()))
            .with_channel(Arc::new(direct))
            .with_channel(Arc::new(script))
            .with_channel(Arc::new(form))
            .with_status(status)
            .build())
    }

    /// The endpoint resolver
    #[must_use]
    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Append a job seeker record
    ///
    /// # Errors
    ///
    /// Fails when no endpoint is configured or every channel fails.
    pub async fn save_job_seeker(&self, record: Payload) -> Result<Delivery> {
        self.execute(Operation::new(Action::SaveJobSeeker, record)).await
    }

    /// Append a job listing record
    ///
    /// # Errors
    ///
    /// Fails when no endpoint is configured or every channel fails.
    pub async fn save_job_listing(&self, record: Payload) -> Result<Delivery> {
        self.execute(Operation::new(Action::SaveJobListing, record)).await
    }

    /// Insert or update an application record
    ///
    /// # Errors
    ///
    /// Fails when no endpoint is configured or every channel fails.
    pub async fn upsert_application(&self, record: Payload) -> Result<Delivery> {
        self.execute(Operation::new(Action::UpsertApplication, record)).await
    }

    /// Append an activity log record
    ///
    /// # Errors
    ///
    /// Fails when no endpoint is configured or every channel fails.
    pub async fn log_activity(&self, record: Payload) -> Result<Delivery> {
        self.execute(Operation::new(Action::LogActivity, record)).await
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Dashboard statistics
    ///
    /// # Errors
    ///
    /// Fails when no endpoint is configured or every channel fails.
    pub async fn get_statistics(&self) -> Result<Value> {
        self.read(Action::GetStats).await
    }

    /// All job seekers
    ///
    /// # Errors
    ///
    /// Fails when no endpoint is configured or every channel fails.
    pub async fn get_job_seekers(&self) -> Result<Value> {
        self.read(Action::GetJobSeekers).await
    }

    /// All job listings
    ///
    /// # Errors
    ///
    /// Fails when no endpoint is configured or every channel fails.
    pub async fn get_job_listings(&self) -> Result<Value> {
        self.read(Action::GetJobListings).await
    }

    /// Probe the backend by fetching statistics; never fails
    pub async fn test_connection(&self) -> ConnectionProbe {
        match self.get_statistics().await {
            Ok(data) => ConnectionProbe {
                success: true,
                message: PROBE_OK.to_string(),
                data: Some(data),
                error: None,
            },
            Err(e) => ConnectionProbe {
                success: false,
                message: PROBE_FAILED.to_string(),
                data: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Blind deliveries still on their way to the backend
    #[must_use]
    pub fn pending_deliveries(&self) -> usize {
        self.selector.channels().map(|c| c.pending()).sum()
    }

    /// Wait up to `timeout` for blind deliveries to finish
    ///
    /// Returns `false` if some were still running at the deadline.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, async {
            for channel in self.selector.channels() {
                channel.drain().await;
            }
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                pending = self.pending_deliveries(),
                timeout_ms = timeout.as_millis() as u64,
                "blind deliveries still running at flush deadline"
            );
        }
        drained
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn read(&self, action: Action) -> Result<Value> {
        self.execute(Operation::bare(action))
            .await
            .map(Delivery::into_value)
    }

    async fn execute(&self, operation: Operation) -> Result<Delivery> {
        let action = operation.action();
        let endpoint = self.resolver.resolve();
        if endpoint.is_empty() {
            warn!(%action, "no endpoint configured");
            self.notify_error("GAS URLが設定されていません");
            return Err(ConnectorError::MissingEndpoint {
                operation: operation.name().to_string(),
            });
        }

        self.notify(&format!("{}中…", action.label()));

        let resolution = self
            .selector
            .run_with(&endpoint, &operation, |failure, next| {
                debug!(%action, from = %failure.channel, to = %next, "retrying on next channel");
                self.notify(&format!("{}を再試行中…", action.label()));
            })
            .await;

        match resolution {
            Resolution::Success { envelope, attempts } => {
                let channel = attempts
                    .last()
                    .map_or(ChannelKind::Direct, |a| a.channel);
                let Some(delivery) = Delivery::from_envelope(envelope) else {
                    let cause = FailureCause::Remote(FALLBACK_ERROR.to_string());
                    return Err(self.fail(&operation, TransportFailure::new(channel, cause)));
                };

                info!(
                    %action,
                    %channel,
                    attempts = attempts.len(),
                    confirmed = delivery.is_confirmed(),
                    "operation finished"
                );
                if delivery.is_confirmed() {
                    self.notify(&format!("{}が完了しました", action.label()));
                } else {
                    self.notify(&format!("{}の送信が完了しました（反映は未確認）", action.label()));
                }
                Ok(delivery)
            }
            Resolution::Exhausted { last, attempts } => {
                debug!(%action, attempts = attempts.len(), "all channels failed");
                Err(self.fail(&operation, last))
            }
        }
    }

    fn fail(&self, operation: &Operation, failure: TransportFailure) -> ConnectorError {
        self.notify(&format!("{}に失敗しました: {}", operation.action().label(), failure));
        ConnectorError::Exhausted {
            operation: operation.name().to_string(),
            failure,
        }
    }

    fn notify(&self, message: &str) {
        let status = &self.status;
        if catch_unwind(AssertUnwindSafe(|| status.report(message))).is_err() {
            warn!(message, "status sink panicked, notice dropped");
        }
    }

    fn notify_error(&self, message: &str) {
        let status = &self.status;
        if catch_unwind(AssertUnwindSafe(|| status.report_error(message))).is_err() {
            warn!(message, "status sink panicked, notice dropped");
        }
    }
}

impl std::fmt::Debug for SheetsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConnector")
            .field("resolver", &self.resolver)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}
