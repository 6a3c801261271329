//! Response Envelope and Normalizer
//!
//! Every channel answers in its own shape: an HTTP status plus body, the
//! argument a JSONP script hands to its callback, a transport exception, or
//! nothing at all (blind form submission). [`normalize`] folds all of them
//! into one canonical [`Envelope`] so the selector and the façade never look
//! at transport details.
//!
//! # Canonical shape
//!
//! ```text
//! { "success": true,  "data": <any, null when absent> }
//! { "success": false, "error": "<message>" }
//! ```
//!
//! Normalizing a canonical envelope yields the same envelope. A blind
//! delivery's receipt is attached only by [`Envelope::acknowledged`]; a
//! `mode` key in a backend reply is just another unknown key.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error text used whenever the backend reports failure without a message
pub const FALLBACK_ERROR: &str = "不明なエラーが発生しました";

// ============================================================================
// Delivery Mode
// ============================================================================

/// How a blind delivery was handed off
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Hidden form posted to a new browsing context
    #[serde(rename = "form-submit")]
    FormSubmit,
    /// Hidden form posted into a hidden frame
    #[serde(rename = "iframe-submit")]
    IframeSubmit,
}

impl DeliveryMode {
    /// Wire tag
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FormSubmit => "form-submit",
            Self::IframeSubmit => "iframe-submit",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Canonical `{success, data | error}` result
///
/// Exactly one of `data` and `error` is populated: `data` when `success` is
/// true, `error` when it is false. Fields are private so the invariant holds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    receipt: Option<FormReceipt>,
}

impl Envelope {
    /// Successful envelope carrying `data`
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            receipt: None,
        }
    }

    /// Failed envelope; an empty message is replaced by [`FALLBACK_ERROR`]
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            FALLBACK_ERROR.to_string()
        } else {
            error
        };
        Self {
            success: false,
            data: None,
            error: Some(error),
            receipt: None,
        }
    }

    /// Successful envelope synthesized for a blind delivery
    pub fn acknowledged(receipt: &FormReceipt) -> Self {
        Self {
            success: true,
            data: Some(receipt.to_value()),
            error: None,
            receipt: Some(receipt.clone()),
        }
    }

    /// Whether the remote side (or the hand-off) succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Response data (successful envelopes only)
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Error text (failed envelopes only)
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Delivery mode, set only for blind deliveries
    #[must_use]
    pub fn mode(&self) -> Option<DeliveryMode> {
        self.receipt.as_ref().map(|r| r.mode)
    }

    /// Split into data or error text
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| FALLBACK_ERROR.to_string()))
        }
    }
}

// ============================================================================
// Form Receipt / Delivery
// ============================================================================

/// Acknowledgement for a blind form delivery
///
/// Means "handed off", never "applied".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormReceipt {
    /// Human-readable hand-off message
    pub message: String,
    /// Always true; kept for wire compatibility with confirmed envelopes
    pub success: bool,
    /// Which blind channel variant was used
    pub mode: DeliveryMode,
    /// ISO-8601 time of the hand-off
    pub timestamp: String,
}

impl FormReceipt {
    /// Receipt for an action handed off through `mode`
    pub fn new(action: &str, mode: DeliveryMode, timestamp: impl Into<String>) -> Self {
        let message = match mode {
            DeliveryMode::FormSubmit => format!("{action}をフォーム送信しました"),
            DeliveryMode::IframeSubmit => format!("{action}をiframe経由で送信しました"),
        };
        Self {
            message,
            success: true,
            mode,
            timestamp: timestamp.into(),
        }
    }

    /// JSON form of the receipt
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "message": self.message,
            "success": true,
            "mode": self.mode.as_str(),
            "timestamp": self.timestamp,
        })
    }
}

/// What a successful operation produced
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    /// The backend answered and reported success
    Confirmed(Value),
    /// The write was handed off blind; the outcome is unknown
    AcknowledgedNotConfirmed(FormReceipt),
}

impl Delivery {
    /// Whether the backend confirmed the outcome
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// Confirmed response data
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Confirmed(data) => Some(data),
            Self::AcknowledgedNotConfirmed(_) => None,
        }
    }

    /// Receipt of a blind delivery
    #[must_use]
    pub fn receipt(&self) -> Option<&FormReceipt> {
        match self {
            Self::Confirmed(_) => None,
            Self::AcknowledgedNotConfirmed(receipt) => Some(receipt),
        }
    }

    /// JSON form handed to callers that only want a value
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Confirmed(data) => data,
            Self::AcknowledgedNotConfirmed(receipt) => receipt.to_value(),
        }
    }

    /// Build from a successful envelope
    ///
    /// Returns `None` for failed envelopes.
    #[must_use]
    pub fn from_envelope(envelope: Envelope) -> Option<Self> {
        if !envelope.success {
            return None;
        }
        Some(match envelope.receipt {
            Some(receipt) => Self::AcknowledgedNotConfirmed(receipt),
            None => Self::Confirmed(envelope.data.unwrap_or(Value::Null)),
        })
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Raw channel output before normalization
#[derive(Clone, Debug)]
pub enum RawResponse<'a> {
    /// HTTP status and body text
    Http {
        /// Status code
        status: u16,
        /// Body text
        body: &'a str,
    },
    /// Argument passed to a JSONP callback
    Script(Value),
    /// Network error, timeout, or load failure
    Exception(String),
    /// Completed blind submission
    FormSubmitted(&'a FormReceipt),
}

/// Fold any raw response into a canonical envelope
#[must_use]
pub fn normalize(raw: RawResponse<'_>) -> Envelope {
    match raw {
        RawResponse::Http { status, body } => {
            if !(200..300).contains(&status) {
                return Envelope::failed(format!("HTTP error: {status}"));
            }
            match parse_body(body) {
                Ok(envelope) => envelope,
                Err(err) => Envelope::failed(err),
            }
        }
        RawResponse::Script(value) => from_value(value),
        RawResponse::Exception(message) => Envelope::failed(message),
        RawResponse::FormSubmitted(receipt) => Envelope::acknowledged(receipt),
    }
}

/// Parse a response body into an envelope
///
/// Only malformed JSON is an error; well-formed JSON without a boolean
/// `success` becomes a failed envelope.
pub fn parse_body(body: &str) -> Result<Envelope, String> {
    let value: Value =
        serde_json::from_str(body.trim()).map_err(|e| format!("invalid response body: {e}"))?;
    Ok(from_value(value))
}

/// Interpret an already-parsed JSON value as an envelope
#[must_use]
pub fn from_value(value: Value) -> Envelope {
    let Value::Object(mut map) = value else {
        return Envelope::failed(FALLBACK_ERROR);
    };

    match map.get("success").and_then(Value::as_bool) {
        Some(true) => {
            Envelope::ok(map.remove("data").unwrap_or(Value::Null))
        }
        _ => {
            let error = map
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or(FALLBACK_ERROR);
            Envelope::failed(error)
        }
    }
}
