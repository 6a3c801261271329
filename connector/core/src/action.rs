//! Backend Actions
//!
//! The closed set of actions the Apps Script backend understands, and the
//! [`Operation`] value that carries one of them to the channel selector.
//!
//! Each action knows its wire name (the `action=` query value and the
//! `action` field of the write envelope) and whether it is a read. Reads need
//! response data, so they may only travel over channels that can return it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat string record sent as the `data` member of a write envelope
pub type Payload = BTreeMap<String, String>;

/// Read/write classification of an action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Fetches data; needs a channel that can observe the response
    Read,
    /// Mutates the remote store; may degrade to blind delivery
    Write,
}

/// Actions exposed by the backend script
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Append a job seeker row
    SaveJobSeeker,
    /// Append a job listing row
    SaveJobListing,
    /// Insert or update an application row
    UpsertApplication,
    /// Append an activity log row
    LogActivity,
    /// Aggregate counters for the dashboard
    GetStats,
    /// List all job seekers
    GetJobSeekers,
    /// List all job listings
    GetJobListings,
}

impl Action {
    /// Every action, in declaration order
    pub const ALL: [Action; 7] = [
        Action::SaveJobSeeker,
        Action::SaveJobListing,
        Action::UpsertApplication,
        Action::LogActivity,
        Action::GetStats,
        Action::GetJobSeekers,
        Action::GetJobListings,
    ];

    /// Name used on the wire
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::SaveJobSeeker => "saveJobSeeker",
            Self::SaveJobListing => "saveJobListing",
            Self::UpsertApplication => "upsertApplication",
            Self::LogActivity => "logActivity",
            Self::GetStats => "getStats",
            Self::GetJobSeekers => "getJobSeekers",
            Self::GetJobListings => "getJobListings",
        }
    }

    /// Look an action up by its wire name
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.wire_name() == name)
    }

    /// Read/write classification
    #[must_use]
    pub fn kind(self) -> OperationKind {
        match self {
            Self::GetStats | Self::GetJobSeekers | Self::GetJobListings => OperationKind::Read,
            Self::SaveJobSeeker
            | Self::SaveJobListing
            | Self::UpsertApplication
            | Self::LogActivity => OperationKind::Write,
        }
    }

    /// Whether this action is a read
    #[must_use]
    pub fn is_read(self) -> bool {
        self.kind() == OperationKind::Read
    }

    /// Human-facing label used in status notices
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::SaveJobSeeker => "求職者登録",
            Self::SaveJobListing => "求人登録",
            Self::UpsertApplication => "応募登録",
            Self::LogActivity => "活動ログ記録",
            Self::GetStats => "統計取得",
            Self::GetJobSeekers => "求職者一覧取得",
            Self::GetJobListings => "求人一覧取得",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A named, parameterized unit of remote work
///
/// Immutable once built; the selector borrows it for every attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    action: Action,
    payload: Payload,
}

impl Operation {
    /// Create an operation with a payload
    pub fn new(action: Action, payload: Payload) -> Self {
        Self { action, payload }
    }

    /// Create an operation with an empty payload (reads)
    pub fn bare(action: Action) -> Self {
        Self::new(action, Payload::new())
    }

    /// The backend action
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Wire name of the action
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.action.wire_name()
    }

    /// Whether this is a read
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.action.is_read()
    }

    /// Read/write classification
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.action.kind()
    }

    /// The record fields
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}
