//! Dirbind Core Library
//!
//! Configuration loading and shared error types for the Dirbind directory
//! authenticator.

pub mod config;
pub mod error;

pub use config::{DirbindConfig, DirectoryConfigSection, LoggingConfig};
pub use error::{Error, Result};

/// Dirbind version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port for plain LDAP
pub const DEFAULT_LDAP_PORT: u16 = 389;

/// Default port for LDAP over TLS
pub const DEFAULT_LDAPS_PORT: u16 = 636;
