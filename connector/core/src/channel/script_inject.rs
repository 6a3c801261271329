//! Script-Inject (JSONP) Channel
//!
//! Read-only fallback that does not depend on CORS. One attempt:
//!
//! ```text
//! 1. bind a fresh callback name in the registry       (CallbackSlot)
//! 2. load <endpoint>?action=<op>&callback=<name>      (ScriptLoader)
//! 3. run the script: its argument goes to <name>      (ScriptCallback)
//! 4. settle on the callback, a load error, or the deadline
//! 5. unbind the name and drop the in-flight load      (guard drop)
//! ```
//!
//! The deadline covers both the load and the wait for the callback. A script
//! that never calls the bound name (HTML error page, wrong callback) is
//! indistinguishable from silence and ends in a timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, warn};

use super::callbacks::{CallbackRegistry, ScriptCallback};
use super::{ensure_carries, Channel, ChannelKind, FailureCause, TransportFailure};
use crate::action::Operation;
use crate::endpoint::Endpoint;
use crate::envelope::{from_value, Envelope};

/// Default deadline for one JSONP attempt
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches script text
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    /// Load the script at `url`
    ///
    /// Fails with [`FailureCause::ScriptLoad`] when the resource cannot be
    /// fetched.
    async fn load(&self, url: Url) -> Result<String, FailureCause>;
}

/// Loads scripts over HTTP
#[derive(Clone)]
pub struct HttpScriptLoader {
    http_client: reqwest::Client,
}

impl HttpScriptLoader {
    /// Create a loader around an HTTP client
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl ScriptLoader for HttpScriptLoader {
    async fn load(&self, url: Url) -> Result<String, FailureCause> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FailureCause::ScriptLoad(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FailureCause::ScriptLoad(format!("HTTP {}", status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| FailureCause::ScriptLoad(e.to_string()))
    }
}

/// JSONP read channel
pub struct ScriptInjectChannel {
    loader: Arc<dyn ScriptLoader>,
    registry: Arc<CallbackRegistry>,
    timeout: Duration,
}

impl ScriptInjectChannel {
    /// Create a channel using the process-wide callback registry
    pub fn new(loader: Arc<dyn ScriptLoader>, timeout: Duration) -> Self {
        Self::with_registry(loader, CallbackRegistry::global(), timeout)
    }

    /// Create a channel bound to a specific registry
    pub fn with_registry(
        loader: Arc<dyn ScriptLoader>,
        registry: Arc<CallbackRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            loader,
            registry,
            timeout,
        }
    }

    /// The registry callbacks are bound in
    #[must_use]
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    fn failure(cause: FailureCause) -> TransportFailure {
        TransportFailure::new(ChannelKind::ScriptInject, cause)
    }
}

#[async_trait]
impl Channel for ScriptInjectChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::ScriptInject
    }

    async fn attempt(
        &self,
        endpoint: &Endpoint,
        operation: &Operation,
    ) -> Result<Envelope, TransportFailure> {
        ensure_carries(ChannelKind::ScriptInject, operation)?;

        let (slot, callback) = self.registry.register(operation.name());
        let url = endpoint
            .with_query(&[("action", operation.name()), ("callback", slot.name())])
            .map_err(|e| Self::failure(e.into()))?;
        debug!(action = %operation.action(), callback = slot.name(), "loading JSONP script");

        let settle = async {
            let script = self.loader.load(url).await?;
            match ScriptCallback::parse(&script) {
                Some(call) => {
                    let name = call.name.clone();
                    if !call.run(&self.registry) {
                        warn!(callback = %name, "JSONP script called an unbound callback");
                    }
                }
                None => warn!(action = %operation.action(), "JSONP response is not a callback script"),
            }
            callback
                .await
                .map_err(|_| FailureCause::ScriptLoad("callback slot closed".to_string()))
        };

        let outcome = tokio::time::timeout(self.timeout, settle).await;
        drop(slot);

        let payload = match outcome {
            Ok(Ok(payload)) => payload,
            Ok(Err(cause)) => return Err(Self::failure(cause)),
            Err(_) => {
                return Err(Self::failure(FailureCause::Timeout {
                    after: self.timeout,
                }))
            }
        };

        let envelope = from_value(payload);
        if envelope.success() {
            Ok(envelope)
        } else {
            let message = envelope.error().unwrap_or_default().to_string();
            Err(Self::failure(FailureCause::Remote(message)))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::action::Action;
    use crate::envelope::FALLBACK_ERROR;

    /// Answers every load by echoing the callback name around a fixed payload
    struct EchoLoader {
        payload: serde_json::Value,
    }

    #[async_trait]
    impl ScriptLoader for EchoLoader {
        async fn load(&self, url: Url) -> Result<String, FailureCause> {
            let callback = url
                .query_pairs()
                .find(|(k, _)| k == "callback")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            Ok(format!("{callback}({});", self.payload))
        }
    }

    /// Never finishes loading
    struct HangingLoader;

    #[async_trait]
    impl ScriptLoader for HangingLoader {
        async fn load(&self, _url: Url) -> Result<String, FailureCause> {
            std::future::pending().await
        }
    }

    /// Fails like a script tag's onerror
    struct BrokenLoader;

    #[async_trait]
    impl ScriptLoader for BrokenLoader {
        async fn load(&self, _url: Url) -> Result<String, FailureCause> {
            Err(FailureCause::ScriptLoad("HTTP 404".into()))
        }
    }

    /// Returns a script for some other callback
    struct StrangerLoader;

    #[async_trait]
    impl ScriptLoader for StrangerLoader {
        async fn load(&self, _url: Url) -> Result<String, FailureCause> {
            Ok("someoneElse({\"success\":true})".to_string())
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::new("https://script.example/exec")
    }

    fn channel(loader: impl ScriptLoader + 'static) -> ScriptInjectChannel {
        ScriptInjectChannel::with_registry(
            Arc::new(loader),
            CallbackRegistry::new(),
            DEFAULT_SCRIPT_TIMEOUT,
        )
    }

    #[tokio::test]
    async fn test_callback_success() {
        let channel = channel(EchoLoader {
            payload: json!({"success": true, "data": [{"name": "田中"}]}),
        });
        let op = Operation::bare(Action::GetJobSeekers);

        let envelope = channel.attempt(&endpoint(), &op).await.unwrap();
        assert_eq!(envelope.data(), Some(&json!([{"name": "田中"}])));
        assert!(channel.registry().is_empty());
    }

    #[tokio::test]
    async fn test_callback_failure_uses_remote_or_fallback_text() {
        let channel = channel(EchoLoader {
            payload: json!({"success": false, "error": "権限がありません"}),
        });
        let op = Operation::bare(Action::GetStats);
        let err = channel.attempt(&endpoint(), &op).await.unwrap_err();
        assert_eq!(err.cause, FailureCause::Remote("権限がありません".into()));

        let channel = self::channel(EchoLoader { payload: json!({}) });
        let err = channel.attempt(&endpoint(), &op).await.unwrap_err();
        assert_eq!(err.cause, FailureCause::Remote(FALLBACK_ERROR.into()));
        assert!(channel.registry().is_empty());
    }

    #[tokio::test]
    async fn test_load_error_releases_slot() {
        let channel = channel(BrokenLoader);
        let op = Operation::bare(Action::GetJobListings);

        let err = channel.attempt(&endpoint(), &op).await.unwrap_err();
        assert_eq!(err.channel, ChannelKind::ScriptInject);
        assert!(matches!(err.cause, FailureCause::ScriptLoad(_)));
        assert!(channel.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_ten_seconds() {
        let channel = channel(HangingLoader);
        let op = Operation::bare(Action::GetJobListings);

        let started = tokio::time::Instant::now();
        let err = channel.attempt(&endpoint(), &op).await.unwrap_err();

        assert_eq!(
            err.cause,
            FailureCause::Timeout {
                after: Duration::from_secs(10)
            }
        );
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(11));
        assert!(channel.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbound_callback_times_out() {
        let channel = channel(StrangerLoader);
        let op = Operation::bare(Action::GetStats);

        let err = channel.attempt(&endpoint(), &op).await.unwrap_err();
        assert!(matches!(err.cause, FailureCause::Timeout { .. }));
        assert!(channel.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_timeouts_do_not_leak() {
        let channel = channel(HangingLoader);
        let op = Operation::bare(Action::GetStats);
        for _ in 0..5 {
            let _ = channel.attempt(&endpoint(), &op).await;
        }
        assert!(channel.registry().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_attempt_releases_slot() {
        let channel = channel(HangingLoader);
        let op = Operation::bare(Action::GetStats);
        let endpoint = endpoint();

        let attempt = channel.attempt(&endpoint, &op);
        // Poll once so the slot is bound, then abandon the attempt
        let polled = tokio::time::timeout(Duration::from_millis(10), attempt).await;
        assert!(polled.is_err());
        assert!(channel.registry().is_empty());
    }

    #[tokio::test]
    async fn test_writes_are_rejected() {
        let channel = channel(BrokenLoader);
        let op = Operation::bare(Action::SaveJobSeeker);
        let err = channel.attempt(&endpoint(), &op).await.unwrap_err();
        assert!(matches!(err.cause, FailureCause::Unsupported { .. }));
    }
}
