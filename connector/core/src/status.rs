//! Status Notices
//!
//! Best-effort progress reporting. The connector posts free-text messages to
//! a [`StatusSink`]; nothing it does depends on the sink succeeding.
//!
//! [`NoticeBoard`] is the stock sink. It holds at most one visible notice:
//!
//! ```text
//! report("保存中…")            ──> visible until superseded or cleared
//! report("登録が完了しました")  ──> visible, expires after 3s
//! report("送信に失敗しました")  ──> visible, expires after 5s
//! report(anything newer)       ──> replaces the current notice, its timer
//!                                  can no longer clear the newer one
//! ```
//!
//! Observers subscribe to the board and see every change, including
//! expiry (`None`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, trace};

/// Default lifetime of a success notice
pub const DEFAULT_SUCCESS_TTL: Duration = Duration::from_secs(3);

/// Default lifetime of a failure notice
pub const DEFAULT_FAILURE_TTL: Duration = Duration::from_secs(5);

const SUCCESS_WORDS: [&str; 2] = ["成功", "完了"];
const FAILURE_WORDS: [&str; 2] = ["エラー", "失敗"];

// ============================================================================
// Sink Trait
// ============================================================================

/// Receives progress notices
///
/// Implementations must not block and must never fail the caller.
pub trait StatusSink: Send + Sync {
    /// Post a free-text notice
    fn report(&self, message: &str);

    /// Post an error notice
    fn report_error(&self, message: &str) {
        self.report(&format!("エラー: {message}"));
    }

    /// Hide whatever is showing
    fn clear(&self);
}

/// Sink that drops every notice
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentStatus;

impl StatusSink for SilentStatus {
    fn report(&self, message: &str) {
        trace!(message, "status notice dropped");
    }

    fn clear(&self) {}
}

// ============================================================================
// Notices
// ============================================================================

/// How a notice reads, which decides when it expires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    /// Contains success vocabulary (成功, 完了)
    Success,
    /// Contains failure vocabulary (エラー, 失敗)
    Failure,
    /// Neither; stays until replaced
    Neutral,
}

impl Tone {
    /// Classify a message; success vocabulary is checked first
    #[must_use]
    pub fn classify(message: &str) -> Self {
        if SUCCESS_WORDS.iter().any(|w| message.contains(w)) {
            Self::Success
        } else if FAILURE_WORDS.iter().any(|w| message.contains(w)) {
            Self::Failure
        } else {
            Self::Neutral
        }
    }
}

/// The visible notice
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Monotonic id; a later notice always has a larger one
    pub id: u64,
    /// Message text
    pub message: String,
    /// Classification of the text
    pub tone: Tone,
    /// When it was posted
    pub posted_at: DateTime<Utc>,
}

// ============================================================================
// Notice Board
// ============================================================================

struct Board {
    current: watch::Sender<Option<Notice>>,
    next_id: AtomicU64,
    success_ttl: Duration,
    failure_ttl: Duration,
}

/// Single-slot notice state with self-expiry
///
/// Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct NoticeBoard {
    inner: Arc<Board>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_TTL, DEFAULT_FAILURE_TTL)
    }
}

impl NoticeBoard {
    /// Create a board with the given expiry times
    #[must_use]
    pub fn new(success_ttl: Duration, failure_ttl: Duration) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(Board {
                current,
                next_id: AtomicU64::new(1),
                success_ttl,
                failure_ttl,
            }),
        }
    }

    /// The notice currently showing
    #[must_use]
    pub fn current(&self) -> Option<Notice> {
        self.inner.current.borrow().clone()
    }

    /// Watch every change to the slot
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<Notice>> {
        self.inner.current.subscribe()
    }

    /// Stream of slot changes, starting with the current value
    #[must_use]
    pub fn subscribe(&self) -> WatchStream<Option<Notice>> {
        WatchStream::new(self.watch())
    }

    fn ttl(&self, tone: Tone) -> Option<Duration> {
        match tone {
            Tone::Success => Some(self.inner.success_ttl),
            Tone::Failure => Some(self.inner.failure_ttl),
            Tone::Neutral => None,
        }
    }

    fn schedule_expiry(&self, id: u64, ttl: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(id, "no runtime, notice will not self-expire");
            return;
        };
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            expire(&inner.current, id);
        });
    }
}

/// Clear the slot if it still shows notice `id`
fn expire(current: &watch::Sender<Option<Notice>>, id: u64) {
    current.send_if_modified(|slot| {
        if slot.as_ref().is_some_and(|n| n.id == id) {
            *slot = None;
            true
        } else {
            false
        }
    });
}

impl StatusSink for NoticeBoard {
    fn report(&self, message: &str) {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let tone = Tone::classify(message);
        info!(target: "sheetlink::status", ?tone, "{message}");

        self.inner.current.send_replace(Some(Notice {
            id,
            message: message.to_string(),
            tone,
            posted_at: Utc::now(),
        }));

        if let Some(ttl) = self.ttl(tone) {
            self.schedule_expiry(id, ttl);
        }
    }

    fn clear(&self) {
        self.inner.current.send_replace(None);
    }
}

impl std::fmt::Debug for NoticeBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoticeBoard")
            .field("current", &self.current())
            .field("success_ttl", &self.inner.success_ttl)
            .field("failure_ttl", &self.inner.failure_ttl)
            .finish()
    }
}
