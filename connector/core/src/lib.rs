//! Sheetlink Core - Multi-Channel Apps Script Connector
//!
//! Client for the recruiting agency's spreadsheet store, which is reachable
//! only through a deployed Apps Script web app. Requests go out over the
//! best channel that works and degrade to the next one when it does not.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Host (CLI, UI, ...)                        │
//! └───────────────┬──────────────────────────────────▲───────────────┘
//!                 │ save_job_seeker / get_statistics │ Notice stream
//! ┌───────────────▼──────────────────────────────────┴───────────────┐
//! │                         SheetsConnector                           │
//! │  ┌──────────────────┐  ┌─────────────────┐  ┌──────────────────┐  │
//! │  │ EndpointResolver │  │ ChannelSelector │  │   StatusSink     │  │
//! │  │ override/default │  │  ordered plans  │  │  (NoticeBoard)   │  │
//! │  └──────────────────┘  └───────┬─────────┘  └──────────────────┘  │
//! │                ┌───────────────┼────────────────┐                 │
//! │           ┌────▼────┐   ┌──────▼───────┐  ┌─────▼──────┐          │
//! │           │ Direct  │   │ ScriptInject │  │ FormSubmit │          │
//! │           │ GET/POST│   │   (JSONP)    │  │  (blind)   │          │
//! │           └────┬────┘   └──────┬───────┘  └─────┬──────┘          │
//! │                └───────── normalize ────────────┘                 │
//! │                         into Envelope                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SheetsConnector`]: named operations (save, upsert, log, get, probe)
//! - [`Envelope`]: canonical `{success, data | error}` result
//! - [`Delivery`]: confirmed data or an acknowledged-but-unconfirmed write
//! - [`ChannelSelector`]: runs the read and write fallback plans
//! - [`EndpointResolver`]: runtime override over the configured default
//! - [`NoticeBoard`]: single-slot, self-expiring progress notices
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sheetlink_core::{load_config, MemoryOverride, NoticeBoard, SheetsConnector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let board = NoticeBoard::new(config.success_notice_ttl, config.failure_notice_ttl);
//!     let connector = SheetsConnector::from_config(
//!         &config,
//!         Arc::new(MemoryOverride::new()),
//!         Arc::new(board.clone()),
//!     )?;
//!
//!     let stats = connector.get_statistics().await?;
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`action`]: backend actions and the [`Operation`] value
//! - [`channel`]: the three delivery channels and the JSONP callback registry
//! - [`config`]: TOML + environment configuration
//! - [`connector`]: the operation façade
//! - [`endpoint`]: endpoint resolution and override stores
//! - [`envelope`]: response normalization
//! - [`error`]: errors surfaced to callers
//! - [`selector`]: ordered channel plans
//! - [`status`]: progress notices

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod channel;
pub mod config;
pub mod connector;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod selector;
pub mod status;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenience
pub use action::{Action, Operation, OperationKind, Payload};
pub use channel::{
    CallbackRegistry, Channel, ChannelKind, DirectChannel, FailureCause, FormSubmitChannel,
    FormTarget, HttpScriptLoader, ScriptInjectChannel, ScriptLoader, TransportFailure,
};
pub use connector::{ConnectionProbe, SheetsConnector, SheetsConnectorBuilder};
pub use endpoint::{
    Endpoint, EndpointError, EndpointResolver, FileOverride, MemoryOverride, OverrideStore,
};
pub use envelope::{normalize, Delivery, DeliveryMode, Envelope, FormReceipt, RawResponse};
pub use error::{ConnectorError, ErrorKind};
pub use selector::{AttemptRecord, ChannelPlan, ChannelSelector, Resolution};
pub use status::{Notice, NoticeBoard, SilentStatus, StatusSink, Tone};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, ConnectorConfig, ConnectorToml, SheetKind, SheetNames,
};
