//! Configuration for Dirbind
//!
//! Loaded from a TOML file, from `DIRBIND_*` environment variables, or from a
//! file with the environment overlaid on top.
//!
//! Example config:
//! ```toml
//! [directory]
//! scheme = "ldaps"
//! host = "ldap.example.com"
//! base_dn = "dc=example,dc=com"
//! bind_dn = "cn=reader,dc=example,dc=com"
//! bind_password = "secret"
//! user_filter = "(uid=%s)"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirbindConfig {
    #[serde(default)]
    pub directory: DirectoryConfigSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DirbindConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_string(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `DIRBIND_*` environment variables on this configuration
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overlay variables resolved through `lookup` on this configuration
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| {
            let value = lookup(name);
            if value.is_some() {
                debug!("Applying {} from environment", name);
            }
            value
        };

        let dir = &mut self.directory;

        if let Some(scheme) = var("DIRBIND_SCHEME") {
            dir.scheme = scheme;
        }
        if let Some(host) = var("DIRBIND_HOST") {
            dir.host = host;
        }
        if let Some(port) = var("DIRBIND_PORT") {
            let parsed = port
                .parse()
                .map_err(|_| invalid_env("DIRBIND_PORT", &port))?;
            dir.port = Some(parsed);
        }
        if let Some(base_dn) = var("DIRBIND_BASE_DN") {
            dir.base_dn = base_dn;
        }
        if let Some(bind_dn) = var("DIRBIND_BIND_DN") {
            dir.bind_dn = bind_dn;
        }
        if let Some(bind_password) = var("DIRBIND_BIND_PASSWORD") {
            dir.bind_password = bind_password;
        }
        if let Some(filter) = var("DIRBIND_USER_FILTER") {
            dir.user_filter = filter;
        }
        if let Some(value) = var("DIRBIND_START_TLS") {
            dir.start_tls = parse_flag("DIRBIND_START_TLS", &value)?;
        }
        if let Some(value) = var("DIRBIND_SKIP_TLS_VERIFY") {
            dir.skip_tls_verify = parse_flag("DIRBIND_SKIP_TLS_VERIFY", &value)?;
        }
        if let Some(value) = var("DIRBIND_TIMEOUT_SECONDS") {
            dir.timeout_seconds = value
                .parse()
                .map_err(|_| invalid_env("DIRBIND_TIMEOUT_SECONDS", &value))?;
        }
        if let Some(attrs) = var("DIRBIND_ATTRIBUTES") {
            dir.attributes = attrs
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(level) = var("DIRBIND_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("DIRBIND_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid_env(name, value)),
    }
}

fn invalid_env(name: &'static str, value: &str) -> Error {
    warn!("Rejecting {}={:?}", name, value);
    Error::InvalidEnv {
        name,
        value: value.to_string(),
    }
}

/// Directory connection and user lookup settings, as written by operators.
///
/// These are plain values; validation happens when the authenticator
/// configuration is built from them.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfigSection {
    /// Transport scheme: `ldap` or `ldaps`
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Directory host name or IP literal
    #[serde(default = "default_host")]
    pub host: String,

    /// Port; defaults to 389 for `ldap` and 636 for `ldaps`
    #[serde(default)]
    pub port: Option<u16>,

    /// Search root for user lookups
    /// Example: "ou=users,dc=example,dc=com"
    #[serde(default)]
    pub base_dn: String,

    /// Service account DN used before the user search
    #[serde(default)]
    pub bind_dn: String,

    /// Service account password; empty means an unauthenticated bind
    #[serde(default)]
    pub bind_password: String,

    /// User search filter with exactly one `%s` or `{username}` placeholder
    /// Example: "(uid=%s)" or "(sAMAccountName={username})"
    #[serde(default = "default_user_filter")]
    pub user_filter: String,

    /// Upgrade a plain connection with STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Connect and per-operation timeout in seconds; 0 disables the
    /// per-operation timeout
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Attributes requested for the matched user; empty requests all
    #[serde(default)]
    pub attributes: Vec<String>,
}

fn default_scheme() -> String {
    "ldap".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_user_filter() -> String {
    "(uid=%s)".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for DirectoryConfigSection {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: None,
            base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: String::new(),
            user_filter: default_user_filter(),
            start_tls: false,
            skip_tls_verify: false,
            timeout_seconds: default_timeout(),
            attributes: Vec::new(),
        }
    }
}

impl fmt::Debug for DirectoryConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfigSection")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &redact(&self.bind_password))
            .field("user_filter", &self.user_filter)
            .field("start_tls", &self.start_tls)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("attributes", &self.attributes)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
