//! Subcommand handlers

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use sheetlink_core::endpoint::is_well_formed;
use sheetlink_core::{
    ConnectorConfig, FileOverride, MemoryOverride, Notice, NoticeBoard, OverrideStore, Payload,
    SheetsConnector, Tone,
};
use tokio::io::AsyncReadExt;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Command, EndpointCommand, RecordArgs};

// ============================================================================
// Notices
// ============================================================================

/// Prints board notices to stderr until stopped
///
/// The board keeps only its latest notice, so notices posted in quick
/// succession may be printed as one.
struct NoticePrinter {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl NoticePrinter {
    fn spawn(board: &NoticeBoard) -> Self {
        let (stop, mut stopped) = oneshot::channel();
        let mut rx = board.watch();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        print_latest(&mut rx);
                    }
                    _ = &mut stopped => {
                        if rx.has_changed().unwrap_or(false) {
                            print_latest(&mut rx);
                        }
                        break;
                    }
                }
            }
        });
        Self { stop, task }
    }

    /// Print anything still pending, then stop
    async fn finish(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            debug!(error = %e, "notice printer ended abnormally");
        }
    }
}

fn print_latest(rx: &mut watch::Receiver<Option<Notice>>) {
    if let Some(notice) = rx.borrow_and_update().as_ref() {
        eprintln!("{}", render_notice(notice));
    }
}

fn render_notice(notice: &Notice) -> String {
    let marker = match notice.tone {
        Tone::Success => "✓",
        Tone::Failure => "✗",
        Tone::Neutral => "…",
    };
    format!("{marker} {}", notice.message)
}

/// Run one subcommand
pub async fn run(
    command: Command,
    config: ConnectorConfig,
    endpoint: Option<String>,
) -> Result<ExitCode> {
    let persisted = open_override_store(config.override_file.clone()).await?;

    // A per-invocation endpoint shadows the persisted override
    let overrides: Arc<dyn OverrideStore> = match (endpoint, persisted.clone()) {
        (Some(url), _) => Arc::new(MemoryOverride::with_value(url)),
        (None, Some(store)) => store,
        (None, None) => Arc::new(MemoryOverride::new()),
    };
    let board = NoticeBoard::new(config.success_notice_ttl, config.failure_notice_ttl);
    let connector = SheetsConnector::from_config(&config, overrides, Arc::new(board.clone()))?;
    debug!(endpoint = %connector.resolver().resolve(), "endpoint in effect");

    let printer = NoticePrinter::spawn(&board);
    let outcome = execute(command, &connector, &config, persisted).await;
    // Blind posts die with the runtime; let them land first
    if !connector.flush(config.request_timeout).await {
        warn!("exiting with form deliveries still in flight");
    }
    printer.finish().await;
    outcome
}

async fn execute(
    command: Command,
    connector: &SheetsConnector,
    config: &ConnectorConfig,
    persisted: Option<Arc<dyn OverrideStore>>,
) -> Result<ExitCode> {
    let output = match command {
        Command::TestConnection => {
            let probe = connector.test_connection().await;
            print_json(&serde_json::to_value(&probe)?)?;
            return Ok(if probe.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::Stats => connector.get_statistics().await?,
        Command::JobSeekers => connector.get_job_seekers().await?,
        Command::JobListings => connector.get_job_listings().await?,
        Command::SaveJobSeeker(record) => {
            let delivery = connector.save_job_seeker(read_record(&record).await?).await?;
            delivery.into_value()
        }
        Command::SaveJobListing(record) => {
            let delivery = connector.save_job_listing(read_record(&record).await?).await?;
            delivery.into_value()
        }
        Command::UpsertApplication(record) => {
            let delivery = connector
                .upsert_application(read_record(&record).await?)
                .await?;
            delivery.into_value()
        }
        Command::LogActivity(record) => {
            let delivery = connector.log_activity(read_record(&record).await?).await?;
            delivery.into_value()
        }
        Command::Endpoint { action } => {
            return manage_endpoint(action, config, persisted).await;
        }
    };

    print_json(&output)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Endpoint override
// ============================================================================

async fn open_override_store(path: Option<PathBuf>) -> Result<Option<Arc<dyn OverrideStore>>> {
    let store = tokio::task::spawn_blocking(move || match path {
        Some(path) => Some(FileOverride::open(path)),
        None => FileOverride::default_location(),
    })
    .await
    .context("override store task failed")?;

    Ok(store.map(|store| {
        debug!(path = %store.path().display(), "using persisted endpoint override");
        Arc::new(store) as Arc<dyn OverrideStore>
    }))
}

async fn manage_endpoint(
    action: EndpointCommand,
    config: &ConnectorConfig,
    store: Option<Arc<dyn OverrideStore>>,
) -> Result<ExitCode> {
    let Some(store) = store else {
        bail!("no location for the endpoint override; set backend.override_file in the config");
    };

    match action {
        EndpointCommand::Show => {
            print_json(&endpoint_report(config, store.get()))?;
        }
        EndpointCommand::Set { url } => {
            let url = url.trim().to_string();
            if !is_well_formed(&url) {
                bail!("not an http(s) URL: {url}");
            }
            let value = url.clone();
            tokio::task::spawn_blocking(move || store.set(&value))
                .await
                .context("override store task failed")??;
            info!(%url, "endpoint override saved");
            eprintln!("endpoint override set to {url}");
        }
        EndpointCommand::Clear => {
            tokio::task::spawn_blocking(move || store.clear())
                .await
                .context("override store task failed")??;
            info!("endpoint override cleared");
            eprintln!("endpoint override cleared");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Endpoint layers plus the spreadsheet the backend serves
fn endpoint_report(config: &ConnectorConfig, overridden: Option<String>) -> Value {
    let effective = match overridden.as_deref() {
        Some(url) if is_well_formed(url.trim()) => url.trim().to_string(),
        _ => config.gas_url.trim().to_string(),
    };
    let sheets: serde_json::Map<String, Value> = config
        .sheets
        .iter()
        .map(|(kind, name)| (kind.key().to_string(), Value::from(name)))
        .collect();
    json!({
        "override": overridden,
        "default": config.gas_url,
        "effective": effective,
        "spreadsheetId": config.spreadsheet_id,
        "sheets": sheets,
    })
}

// ============================================================================
// Record input
// ============================================================================

async fn read_record(args: &RecordArgs) -> Result<Payload> {
    let text = read_input(&args.data).await?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", args.data.display()))?;
    to_payload(value)
}

async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read record from stdin")?;
        Ok(text)
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read record: {}", path.display()))
    }
}

/// Flatten a JSON object into string-valued record fields
///
/// Strings pass through, `null` becomes empty, anything else is kept as
/// compact JSON text.
fn to_payload(value: Value) -> Result<Payload> {
    let Value::Object(fields) = value else {
        bail!("record must be a JSON object");
    };

    Ok(fields
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
