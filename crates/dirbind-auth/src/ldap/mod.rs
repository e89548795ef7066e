//! LDAP search-then-bind authentication
//!
//! Provides:
//! - Validated authenticator configuration
//! - A directory client abstraction with an `ldap3` implementation
//! - Filter templating with username escaping
//! - The authenticator: connect, service bind, search, single-match check,
//!   user bind

mod authenticator;
mod client;
mod directory;
mod error;
mod filter;
mod types;

pub use authenticator::{Authenticator, LdapAuthenticator};
pub use client::{LdapDirectory, LdapDirectoryConnection};
pub use directory::{DirectoryClient, DirectoryConnection};
pub use error::{AuthError, ConfigError, DirectoryError};
pub use filter::{FilterTemplate, PLACEHOLDERS};
pub use types::*;
