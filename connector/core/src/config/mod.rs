//! TOML Configuration File Support
//!
//! Configuration for the connector lives in
//! `$XDG_CONFIG_HOME/sheetlink/connector.toml` (typically
//! `~/.config/sheetlink/connector.toml`).
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`SHEETLINK_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! The runtime endpoint override (see [`crate::endpoint`]) sits above all of
//! these when the connector resolves its endpoint.
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! gas_url = "https://script.google.com/macros/s/XXXX/exec"
//! debug = false
//!
//! [spreadsheet]
//! id = "1OsOQXGbbg8uS6Bg5JCFaPpqPX9aeEtWJHIKqgnzF96w"
//!
//! [spreadsheet.sheets]
//! job_seekers = "求職者マスタ"
//!
//! [transport]
//! timeout_ms = 30000
//! jsonp_timeout_ms = 10000
//! form_target = "hidden-frame"
//!
//! [status]
//! success_ttl_ms = 3000
//! failure_ttl_ms = 5000
//! ```

mod sheets;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{FormTarget, DEFAULT_SCRIPT_TIMEOUT};
use crate::endpoint::is_well_formed;
use crate::status::{DEFAULT_FAILURE_TTL, DEFAULT_SUCCESS_TTL};

pub use sheets::{SheetKind, SheetNames};

/// Deployed backend script
pub const DEFAULT_GAS_URL: &str = "https://script.google.com/macros/s/AKfycbwFw50sGgSkOGeIpJqWbFqnT2HNloecNk4FwJf4yQtmO1zG6s9qjOACyH813VNcmVgp/exec";

/// Backing spreadsheet
pub const DEFAULT_SPREADSHEET_ID: &str = "1OsOQXGbbg8uS6Bg5JCFaPpqPX9aeEtWJHIKqgnzF96w";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Static endpoint of the backend script
    pub gas_url: Option<String>,

    /// Verbose diagnostics
    pub debug: Option<bool>,

    /// File holding the runtime endpoint override
    pub override_file: Option<PathBuf>,
}

/// Sheet names under `[spreadsheet.sheets]`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsToml {
    /// 求職者マスタ
    pub job_seekers: Option<String>,
    /// 求人マスタ
    pub job_listings: Option<String>,
    /// 企業マスタ
    pub companies: Option<String>,
    /// 応募管理
    pub applications: Option<String>,
    /// 面接スケジュール
    pub interviews: Option<String>,
    /// 成約・入社管理
    pub contracts: Option<String>,
    /// アクティビティログ
    pub activity_log: Option<String>,
    /// 月次統計
    pub monthly_stats: Option<String>,
    /// KPIダッシュボード
    pub kpi_dashboard: Option<String>,
    /// システム設定
    pub system_settings: Option<String>,
    /// ユーザー管理
    pub user_management: Option<String>,
}

impl SheetsToml {
    fn entries(&self) -> [(SheetKind, Option<&String>); 11] {
        [
            (SheetKind::JobSeekers, self.job_seekers.as_ref()),
            (SheetKind::JobListings, self.job_listings.as_ref()),
            (SheetKind::Companies, self.companies.as_ref()),
            (SheetKind::Applications, self.applications.as_ref()),
            (SheetKind::Interviews, self.interviews.as_ref()),
            (SheetKind::Contracts, self.contracts.as_ref()),
            (SheetKind::ActivityLog, self.activity_log.as_ref()),
            (SheetKind::MonthlyStats, self.monthly_stats.as_ref()),
            (SheetKind::KpiDashboard, self.kpi_dashboard.as_ref()),
            (SheetKind::SystemSettings, self.system_settings.as_ref()),
            (SheetKind::UserManagement, self.user_management.as_ref()),
        ]
    }
}

/// Spreadsheet section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetToml {
    /// Spreadsheet id
    pub id: Option<String>,

    /// Sheet names
    pub sheets: SheetsToml,
}

/// Transport section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// Direct request and form delivery timeout in milliseconds
    pub timeout_ms: Option<u64>,

    /// Script-inject deadline in milliseconds
    pub jsonp_timeout_ms: Option<u64>,

    /// Where blind form posts go (`new-window` or `hidden-frame`)
    pub form_target: Option<FormTarget>,
}

/// Status section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusToml {
    /// Lifetime of success notices in milliseconds
    pub success_ttl_ms: Option<u64>,

    /// Lifetime of failure notices in milliseconds
    pub failure_ttl_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Spreadsheet configuration section
    pub spreadsheet: SpreadsheetToml,

    /// Transport configuration section
    pub transport: TransportToml,

    /// Status notice configuration section
    pub status: StatusToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved connector configuration
///
/// Use [`load_config`] to load it with proper priority handling.
#[derive(Clone, Debug)]
pub struct ConnectorConfig {
    /// Static endpoint of the backend script (may be empty)
    pub gas_url: String,

    /// Spreadsheet id
    pub spreadsheet_id: String,

    /// Sheet catalogue
    pub sheets: SheetNames,

    /// Direct request and form delivery timeout
    pub request_timeout: Duration,

    /// Script-inject deadline
    pub script_timeout: Duration,

    /// Verbose diagnostics
    pub debug: bool,

    /// Where blind form posts go
    pub form_target: FormTarget,

    /// Lifetime of success notices
    pub success_notice_ttl: Duration,

    /// Lifetime of failure notices
    pub failure_notice_ttl: Duration,

    /// File holding the runtime endpoint override (default location if `None`)
    pub override_file: Option<PathBuf>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            gas_url: DEFAULT_GAS_URL.to_string(),
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            sheets: SheetNames::default(),
            request_timeout: Duration::from_secs(30),
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            debug: false,
            form_target: FormTarget::NewWindow,
            success_notice_ttl: DEFAULT_SUCCESS_TTL,
            failure_notice_ttl: DEFAULT_FAILURE_TTL,
            override_file: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ConnectorConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would make the connector unusable
    ///
    /// An empty `gas_url` is allowed: operations then fail with a
    /// configuration error unless a runtime override is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for zero timeouts or a
    /// non-http(s) endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "transport.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.script_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "transport.jsonp_timeout_ms must be greater than zero".into(),
            ));
        }
        let url = self.gas_url.trim();
        if !url.is_empty() && !is_well_formed(url) {
            return Err(ConfigError::ValidationError(format!(
                "backend.gas_url must start with http:// or https://, got {url:?}"
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/sheetlink/connector.toml` or
/// `~/.config/sheetlink/connector.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sheetlink").join("connector.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ConnectorConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ConnectorConfig, ConfigError> {
    let mut config = ConnectorConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ConnectorToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ConnectorConfig, toml: &ConnectorToml) {
    // Backend
    if let Some(ref url) = toml.backend.gas_url {
        config.gas_url = url.trim().to_string();
    }
    if let Some(debug) = toml.backend.debug {
        config.debug = debug;
    }
    if toml.backend.override_file.is_some() {
        config.override_file = toml.backend.override_file.clone();
    }

    // Spreadsheet
    if let Some(ref id) = toml.spreadsheet.id {
        config.spreadsheet_id = id.clone();
    }
    for (kind, name) in toml.spreadsheet.sheets.entries() {
        if let Some(name) = name {
            config.sheets.set(kind, name.clone());
        }
    }

    // Transport
    if let Some(ms) = toml.transport.timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.transport.jsonp_timeout_ms {
        config.script_timeout = Duration::from_millis(ms);
    }
    if let Some(target) = toml.transport.form_target {
        config.form_target = target;
    }

    // Status
    if let Some(ms) = toml.status.success_ttl_ms {
        config.success_notice_ttl = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.status.failure_ttl_ms {
        config.failure_notice_ttl = Duration::from_millis(ms);
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut ConnectorConfig) {
    if let Ok(url) = std::env::var("SHEETLINK_GAS_URL") {
        config.gas_url = url.trim().to_string();
        config.source = ConfigSource::Env;
    }
    if let Ok(id) = std::env::var("SHEETLINK_SPREADSHEET_ID") {
        config.spreadsheet_id = id;
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("SHEETLINK_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.request_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(timeout) = std::env::var("SHEETLINK_JSONP_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.script_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(debug) = std::env::var("SHEETLINK_DEBUG") {
        config.debug = debug != "0" && debug.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub gas_url: Option<String>,

    /// Form target override
    pub form_target: Option<FormTarget>,

    /// Debug override
    pub debug: Option<bool>,

    /// Request timeout override (milliseconds)
    pub timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_gas_url(mut self, url: String) -> Self {
        self.gas_url = Some(url);
        self
    }

    /// Set form target override
    #[must_use]
    pub fn with_form_target(mut self, target: FormTarget) -> Self {
        self.form_target = Some(target);
        self
    }

    /// Set debug override
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Set request timeout override
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ConnectorConfig) {
        if self.gas_url.is_some()
            || self.form_target.is_some()
            || self.debug.is_some()
            || self.timeout_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.gas_url {
            config.gas_url = url.trim().to_string();
        }
        if let Some(target) = self.form_target {
            config.form_target = target;
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
        if let Some(ms) = self.timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
