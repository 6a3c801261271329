//! Direct Channel
//!
//! Plain request to the backend script. Both encodings are chosen so the
//! request stays "simple" and never triggers a CORS preflight:
//! - reads: `GET <endpoint>?action=<op>` with no body
//! - writes: `POST <endpoint>` with a form-encoded body holding one field,
//!   `jsonData`, whose value is the JSON write envelope

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{
    ensure_carries, iso_timestamp, write_envelope, Channel, ChannelKind, FailureCause,
    TransportFailure, FORM_CONTENT_TYPE, WRITE_FIELD,
};
use crate::action::Operation;
use crate::endpoint::Endpoint;
use crate::envelope::{parse_body, Envelope};

/// Direct request channel
#[derive(Clone)]
pub struct DirectChannel {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl DirectChannel {
    /// Create a channel with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            timeout,
        })
    }

    /// Create a channel around an existing client
    pub fn with_client(http_client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    fn failure(cause: FailureCause) -> TransportFailure {
        TransportFailure::new(ChannelKind::Direct, cause)
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        operation: &Operation,
    ) -> Result<reqwest::Response, TransportFailure> {
        let request = if operation.is_read() {
            let url = endpoint
                .with_query(&[("action", operation.name())])
                .map_err(|e| Self::failure(e.into()))?;
            self.http_client.get(url)
        } else {
            let json_data = write_envelope(operation, &iso_timestamp()).to_string();
            self.http_client
                .post(endpoint.as_str())
                .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
                .form(&[(WRITE_FIELD, json_data)])
        };

        request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::failure(FailureCause::from_reqwest(&e, self.timeout)))
    }
}

#[async_trait]
impl Channel for DirectChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Direct
    }

    async fn attempt(
        &self,
        endpoint: &Endpoint,
        operation: &Operation,
    ) -> Result<Envelope, TransportFailure> {
        ensure_carries(ChannelKind::Direct, operation)?;
        debug!(action = %operation.action(), "direct request");

        let response = self.send(endpoint, operation).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::failure(FailureCause::Http {
                status: status.as_u16(),
            }));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::failure(FailureCause::from_reqwest(&e, self.timeout)))?;
        let envelope = parse_body(&body).map_err(|e| Self::failure(FailureCause::Parse(e)))?;

        if envelope.success() {
            Ok(envelope)
        } else {
            let message = envelope.error().unwrap_or_default().to_string();
            Err(Self::failure(FailureCause::Remote(message)))
        }
    }
}
