//! Configuration loading for the Dirbind CLI
//!
//! Precedence, lowest first: built-in defaults, the `--config` file,
//! `DIRBIND_*` environment variables (including a `.env` file), then
//! command-line flags.

use anyhow::{Context, Result};
use dirbind_auth::AuthenticatorConfig;
use dirbind_core::DirbindConfig;

/// Command-line overrides applied on top of file and environment values
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_dn: Option<String>,
    pub log_level: Option<String>,
}

/// Load configuration from an optional file, the environment, and overrides
pub fn load(path: Option<&str>, overrides: &Overrides) -> Result<DirbindConfig> {
    let mut config = match path {
        Some(path) => DirbindConfig::from_file(path)?,
        None => DirbindConfig::default(),
    };

    config
        .apply_env()
        .context("Invalid DIRBIND_* environment variable")?;

    apply_overrides(&mut config, overrides);
    Ok(config)
}

pub fn apply_overrides(config: &mut DirbindConfig, overrides: &Overrides) {
    if let Some(host) = &overrides.host {
        config.directory.host = host.clone();
    }
    if let Some(port) = overrides.port {
        config.directory.port = Some(port);
    }
    if let Some(base_dn) = &overrides.base_dn {
        config.directory.base_dn = base_dn.clone();
    }
    if let Some(level) = &overrides.log_level {
        config.logging.level = level.clone();
    }
}

/// Validate the directory section into an authenticator configuration
pub fn authenticator_config(config: &DirbindConfig) -> Result<AuthenticatorConfig> {
    AuthenticatorConfig::from_section(&config.directory)
        .context("Invalid directory configuration")
}
