//! Form-Submit Channel
//!
//! Blind write fallback. The write envelope is packed into a single
//! `jsonData` form field and handed to a detached delivery, the equivalent
//! of posting a hidden form into another browsing context. The response is
//! never observed: once the hand-off succeeds the attempt reports
//! `{success: true, mode: "form-submit"}` (or `"iframe-submit"`).
//!
//! That acknowledgement means "handed off", not "applied". It is surfaced as
//! a distinct envelope `mode` so callers can tell it from a confirmed write.
//! Deliveries are tracked; [`Channel::drain`] waits until every one has
//! reached the backend or given up, so a process can exit without cutting
//! a post short.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::{
    ensure_carries, iso_timestamp, write_envelope, Channel, ChannelKind, FailureCause,
    TransportFailure,
};
use crate::action::Operation;
use crate::endpoint::Endpoint;
use crate::envelope::{normalize, DeliveryMode, Envelope, FormReceipt, RawResponse};

/// Name of the single form field carrying the JSON write envelope
pub const WRITE_FIELD: &str = "jsonData";

/// Content type of write bodies; `.form()` keeps a type that is already set
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Where the hidden form is posted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormTarget {
    /// A new browsing context
    #[default]
    NewWindow,
    /// A hidden frame
    HiddenFrame,
}

impl FormTarget {
    /// Delivery mode reported for this target
    #[must_use]
    pub fn mode(self) -> DeliveryMode {
        match self {
            Self::NewWindow => DeliveryMode::FormSubmit,
            Self::HiddenFrame => DeliveryMode::IframeSubmit,
        }
    }
}

impl std::str::FromStr for FormTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new-window" | "window" | "form" => Ok(Self::NewWindow),
            "hidden-frame" | "iframe" | "frame" => Ok(Self::HiddenFrame),
            other => Err(format!("unknown form target: {other}")),
        }
    }
}

/// Blind form-post channel
#[derive(Clone)]
pub struct FormSubmitChannel {
    http_client: reqwest::Client,
    target: FormTarget,
    timeout: Duration,
    deliveries: TaskTracker,
}

impl FormSubmitChannel {
    /// Create a channel posting to `target`
    ///
    /// `timeout` bounds each detached delivery so none outlives it.
    pub fn new(http_client: reqwest::Client, target: FormTarget, timeout: Duration) -> Self {
        Self {
            http_client,
            target,
            timeout,
            deliveries: TaskTracker::new(),
        }
    }

    /// The configured target
    #[must_use]
    pub fn target(&self) -> FormTarget {
        self.target
    }

    fn failure(cause: FailureCause) -> TransportFailure {
        TransportFailure::new(ChannelKind::FormSubmit, cause)
    }
}

#[async_trait]
impl Channel for FormSubmitChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::FormSubmit
    }

    async fn attempt(
        &self,
        endpoint: &Endpoint,
        operation: &Operation,
    ) -> Result<Envelope, TransportFailure> {
        ensure_carries(ChannelKind::FormSubmit, operation)?;

        let url = endpoint.url().map_err(|e| Self::failure(e.into()))?;
        let timestamp = iso_timestamp();
        let json_data = write_envelope(operation, &timestamp).to_string();
        let request = self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .form(&[(WRITE_FIELD, json_data)])
            .timeout(self.timeout)
            .build()
            .map_err(|e| Self::failure(FailureCause::Submission(e.to_string())))?;

        let client = self.http_client.clone();
        let action = operation.action();
        self.deliveries.spawn(async move {
            match client.execute(request).await {
                Ok(response) => {
                    debug!(%action, status = response.status().as_u16(), "form delivery finished");
                }
                Err(e) => warn!(%action, error = %e, "form delivery failed after hand-off"),
            }
        });

        let mode = self.target.mode();
        debug!(action = %operation.action(), %mode, "form handed off");
        let receipt = FormReceipt::new(operation.name(), mode, timestamp);
        Ok(normalize(RawResponse::FormSubmitted(&receipt)))
    }

    fn pending(&self) -> usize {
        self.deliveries.len()
    }

    async fn drain(&self) {
        // Closing only lets `wait` resolve once empty; later spawns still run
        self.deliveries.close();
        self.deliveries.wait().await;
    }
}
