//! Endpoint Resolution
//!
//! The backend URL comes from two layers, first match wins:
//!
//! 1. a runtime override, if present and starting with `http://` or `https://`
//! 2. the static default from configuration
//! 3. otherwise the empty endpoint
//!
//! An empty endpoint is a configuration error for the caller; no request is
//! ever attempted against it. The resolver is injected into the connector
//! rather than looked up ambiently, so every operation resolves the same way.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, warn};

/// Endpoint parsing and override persistence errors
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The endpoint is not an absolute URL
    #[error("invalid endpoint {url:?}: {source}")]
    InvalidUrl {
        /// The rejected value
        url: String,
        /// Why it did not parse
        #[source]
        source: url::ParseError,
    },

    /// The override file could not be updated
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        /// What was being done (`create`, `write`, `remove`)
        action: &'static str,
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// A resolved backend URL (possibly empty)
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Wrap a URL string
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The empty endpoint
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Whether no endpoint is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The raw URL
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as a URL
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidUrl`] when the endpoint does not parse.
    pub fn url(&self) -> Result<Url, EndpointError> {
        Url::parse(&self.0).map_err(|source| EndpointError::InvalidUrl {
            url: self.0.clone(),
            source,
        })
    }

    /// Parse and append query pairs
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidUrl`] when the endpoint does not parse.
    pub fn with_query(&self, pairs: &[(&str, &str)]) -> Result<Url, EndpointError> {
        let mut url = self.url()?;
        url.query_pairs_mut().extend_pairs(pairs);
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `url` is acceptable as an override
#[must_use]
pub fn is_well_formed(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

// ============================================================================
// Override Stores
// ============================================================================

/// Runtime-settable endpoint override
///
/// Stores hold whatever they were given; validation happens at resolution.
pub trait OverrideStore: Send + Sync {
    /// Current override, if any
    fn get(&self) -> Option<String>;

    /// Replace the override
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Io`] when the value cannot be persisted.
    fn set(&self, url: &str) -> Result<(), EndpointError>;

    /// Remove the override
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Io`] when the persisted value cannot be removed.
    fn clear(&self) -> Result<(), EndpointError>;
}

/// Override kept in memory for the life of the process
#[derive(Debug, Default)]
pub struct MemoryOverride {
    value: RwLock<Option<String>>,
}

impl MemoryOverride {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `url`
    pub fn with_value(url: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(url.into())),
        }
    }
}

impl OverrideStore for MemoryOverride {
    fn get(&self) -> Option<String> {
        self.value.read().clone()
    }

    fn set(&self, url: &str) -> Result<(), EndpointError> {
        *self.value.write() = Some(url.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), EndpointError> {
        *self.value.write() = None;
        Ok(())
    }
}

/// Override persisted as a one-line file
///
/// The file is read once when the store is opened; later reads come from
/// memory and writes go through to the file.
#[derive(Debug)]
pub struct FileOverride {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileOverride {
    /// Open the store at `path`, loading any value already persisted there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = read_persisted(&path);
        if let Some(ref value) = cached {
            debug!(path = %path.display(), value, "loaded persisted endpoint override");
        }
        Self {
            path,
            cached: RwLock::new(cached),
        }
    }

    /// Store at `$XDG_CONFIG_HOME/sheetlink/endpoint_override`
    #[must_use]
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::open(dir.join("sheetlink").join("endpoint_override")))
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_persisted(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let value = content.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl OverrideStore for FileOverride {
    fn get(&self) -> Option<String> {
        self.cached.read().clone()
    }

    fn set(&self, url: &str) -> Result<(), EndpointError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EndpointError::Io {
                action: "create",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let url = url.trim();
        std::fs::write(&self.path, format!("{url}\n")).map_err(|source| EndpointError::Io {
            action: "write",
            path: self.path.clone(),
            source,
        })?;
        *self.cached.write() = Some(url.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), EndpointError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(EndpointError::Io {
                    action: "remove",
                    path: self.path.clone(),
                    source,
                })
            }
        }
        *self.cached.write() = None;
        Ok(())
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Override-then-default endpoint resolution
#[derive(Clone)]
pub struct EndpointResolver {
    overrides: Arc<dyn OverrideStore>,
    default: String,
}

impl EndpointResolver {
    /// Create a resolver
    pub fn new(overrides: Arc<dyn OverrideStore>, default: impl Into<String>) -> Self {
        Self {
            overrides,
            default: default.into(),
        }
    }

    /// Resolver with no override layer
    pub fn fixed(default: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryOverride::new()), default)
    }

    /// The override store
    #[must_use]
    pub fn overrides(&self) -> &Arc<dyn OverrideStore> {
        &self.overrides
    }

    /// The static default
    #[must_use]
    pub fn default_endpoint(&self) -> &str {
        &self.default
    }

    /// Resolve the active endpoint
    #[must_use]
    pub fn resolve(&self) -> Endpoint {
        if let Some(candidate) = self.overrides.get() {
            let candidate = candidate.trim();
            if is_well_formed(candidate) {
                debug!(endpoint = candidate, "using endpoint override");
                return Endpoint::new(candidate);
            }
            if !candidate.is_empty() {
                warn!(value = candidate, "ignoring malformed endpoint override");
            }
        }

        let default = self.default.trim();
        if default.is_empty() {
            Endpoint::empty()
        } else {
            Endpoint::new(default)
        }
    }
}

impl fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("override", &self.overrides.get())
            .field("default", &self.default)
            .finish()
    }
}
