//! Sheetlink - Command-line front end for the recruiting spreadsheet backend
//!
//! Runs one connector operation per invocation. Results go to stdout as
//! pretty JSON; progress notices and logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Check that the backend answers
//! sheetlink test-connection
//!
//! # Read
//! sheetlink stats
//! sheetlink job-seekers --endpoint https://script.google.com/macros/s/XXX/exec
//!
//! # Write a record from a JSON object (file or stdin)
//! sheetlink save-job-seeker --data seeker.json
//! echo '{"name":"田中"}' | sheetlink log-activity --data -
//!
//! # Persist an endpoint override
//! sheetlink endpoint set https://script.google.com/macros/s/XXX/exec
//!
//! # Verbose logging
//! RUST_LOG=debug sheetlink stats
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sheetlink_core::{default_config_path, load_config_from_path, ConfigOverrides, FormTarget};
use tracing::{debug, info};

/// Sheetlink - Apps Script connector for the recruiting spreadsheet store
#[derive(Parser, Debug)]
#[command(name = "sheetlink")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "SHEETLINK_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Use this endpoint instead of the configured default
    #[arg(short = 'e', long, value_name = "URL", global = true)]
    endpoint: Option<String>,

    /// Blind write variant (new-window, iframe)
    #[arg(long, value_name = "TARGET", global = true)]
    form_target: Option<FormTarget>,

    /// Request timeout in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short = 'l',
        long,
        env = "SHEETLINK_LOG_LEVEL",
        default_value = "warn",
        global = true
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Connector operations
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe the backend by fetching statistics
    TestConnection,
    /// Dashboard statistics
    Stats,
    /// List job seekers
    JobSeekers,
    /// List job listings
    JobListings,
    /// Append a job seeker record
    SaveJobSeeker(RecordArgs),
    /// Append a job listing record
    SaveJobListing(RecordArgs),
    /// Insert or update an application record
    UpsertApplication(RecordArgs),
    /// Append an activity log record
    LogActivity(RecordArgs),
    /// Inspect or change the persisted endpoint override
    Endpoint {
        #[command(subcommand)]
        action: EndpointCommand,
    },
}

/// Record input for write operations
#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    /// JSON object with the record fields; `-` reads stdin
    #[arg(short = 'd', long, value_name = "FILE")]
    data: PathBuf,
}

/// Endpoint override management
#[derive(Subcommand, Debug)]
pub enum EndpointCommand {
    /// Print the override, the default, and the endpoint in effect
    Show,
    /// Persist an override
    Set {
        /// Deployed web app URL
        url: String,
    },
    /// Remove the override
    Clear,
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so stdout carries only results.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("sheetlink={level},sheetlink_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Loaded before logging starts so the debug flag can raise the level
    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = tokio::task::spawn_blocking(move || load_config_from_path(config_path))
        .await
        .context("config loader task failed")?
        .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(target) = args.form_target {
        overrides = overrides.with_form_target(target);
    }
    if let Some(ms) = args.timeout_ms {
        overrides = overrides.with_timeout_ms(ms);
    }
    overrides.apply(&mut config);

    let level = if config.debug { "debug" } else { args.log_level.as_str() };
    init_logging(level);
    debug!(version = env!("CARGO_PKG_VERSION"), "sheetlink starting");

    config.validate().context("Invalid configuration")?;
    info!(
        source = %config.source(),
        config_file = ?config.config_file_path,
        "configuration loaded"
    );

    commands::run(args.command, config, args.endpoint).await
}
