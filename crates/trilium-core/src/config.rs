//! Configuration management for the Trilium ETAPI adapter.
//!
//! Configuration is read once from the environment at startup and treated as
//! immutable afterwards: the upstream endpoint, the static API token, the
//! capability set gating which tools are published, and diagnostics
//! verbosity. There is no config file; the adapter is designed to be spawned
//! by an MCP host that supplies environment variables.
//!
//! ## Environment variables
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `TRILIUM_API_URL` | `http://localhost:8080/etapi` | Upstream ETAPI base URL |
//! | `TRILIUM_API_TOKEN` | required | Static token for the `Authorization` header |
//! | `PERMISSIONS` | `READ;WRITE` | Semicolon-separated capability list |
//! | `VERBOSE` | `false` | Debug traces on standard error |
//! | `TRILIUM_TIMEOUT_SECS` | `30` | Per-call upstream timeout in seconds |

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default upstream endpoint when `TRILIUM_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/etapi";

/// Default per-call upstream timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A capability gating a group of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    /// Search and retrieval tools.
    Read,
    /// Create, update, append and delete tools.
    Write,
}

impl Permission {
    /// Parse a single capability token, case-insensitively.
    fn parse(token: &str) -> Result<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "READ" => Ok(Self::Read),
            "WRITE" => Ok(Self::Write),
            other => Err(Error::Config(format!(
                "unknown permission '{other}' (expected READ or WRITE)"
            ))),
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("READ"),
            Self::Write => f.write_str("WRITE"),
        }
    }
}

/// The set of capabilities active for this process.
///
/// Parsed once from the semicolon-separated `PERMISSIONS` variable and never
/// mutated afterwards, so the published tool catalog stays stable for
/// clients that cache it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Parse a semicolon-separated capability list such as `READ;WRITE`.
    ///
    /// Empty segments are skipped; an entirely empty list is rejected since
    /// a server with no dispatchable tools is a misconfiguration.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut set = BTreeSet::new();
        for token in raw.split(';').filter(|t| !t.trim().is_empty()) {
            set.insert(Permission::parse(token)?);
        }
        if set.is_empty() {
            return Err(Error::Config(
                "PERMISSIONS resolved to an empty set; at least READ or WRITE is required"
                    .to_string(),
            ));
        }
        Ok(Self(set))
    }

    /// The default capability set: both READ and WRITE.
    #[must_use]
    pub fn all() -> Self {
        Self(BTreeSet::from([Permission::Read, Permission::Write]))
    }

    /// A read-only capability set.
    #[must_use]
    pub fn read_only() -> Self {
        Self(BTreeSet::from([Permission::Read]))
    }

    /// Whether the given capability is held.
    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Whether READ is held.
    #[must_use]
    pub fn can_read(&self) -> bool {
        self.contains(Permission::Read)
    }

    /// Whether WRITE is held.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.contains(Permission::Write)
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::all()
    }
}

impl std::fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";");
        f.write_str(&joined)
    }
}

/// Read-only process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream ETAPI base URL.
    pub base_url: Url,
    /// Static token forwarded in the `Authorization` header.
    pub token: String,
    /// Active capability set.
    pub permissions: PermissionSet,
    /// Whether to emit debug traces to standard error.
    pub verbose: bool,
    /// Per-call upstream timeout.
    pub timeout: Duration,
}

impl Config {
    /// Build a configuration from explicit values, validating the base URL.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Config("API token must not be empty".to_string()));
        }
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            token,
            permissions: PermissionSet::all(),
            verbose: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Load configuration from the process environment.
    ///
    /// `TRILIUM_API_TOKEN` is the only required variable; everything else
    /// falls back to its documented default.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("TRILIUM_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token = std::env::var("TRILIUM_API_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("TRILIUM_API_TOKEN is required but not set".to_string())
            })?;

        let permissions = match std::env::var("PERMISSIONS") {
            Ok(raw) if !raw.trim().is_empty() => PermissionSet::parse(&raw)?,
            _ => PermissionSet::all(),
        };

        let verbose = std::env::var("VERBOSE")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let timeout = match std::env::var("TRILIUM_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    Error::Config(format!(
                        "TRILIUM_TIMEOUT_SECS must be a positive integer, got '{raw}'"
                    ))
                })?;
                if secs == 0 {
                    return Err(Error::Config(
                        "TRILIUM_TIMEOUT_SECS must be at least 1".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            },
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let mut config = Self::new(&base_url, token)?;
        config.permissions = permissions;
        config.verbose = verbose;
        config.timeout = timeout;
        Ok(config)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("invalid TRILIUM_API_URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "TRILIUM_API_URL must be http or https, got '{other}'"
        ))),
    }
}

/// Lenient boolean parsing for flags like `VERBOSE`.
fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
