//! Directory authentication error types
//!
//! Messages never carry passwords. Authentication failures for "no such
//! user" and "ambiguous match" share one variant so callers cannot tell them
//! apart.

use thiserror::Error;

use crate::ldap::types::AuthStage;

/// Invalid authenticator configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported scheme {0:?}, expected ldap or ldaps")]
    UnsupportedScheme(String),

    #[error("Directory host is required")]
    MissingHost,

    #[error("Directory port must be non-zero")]
    InvalidPort,

    #[error("Invalid directory address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Base DN is required")]
    MissingBaseDn,

    #[error("User filter {template:?} must contain exactly one %s or {{username}} placeholder, found {found}")]
    FilterPlaceholder { template: String, found: usize },

    #[error("STARTTLS cannot be combined with the ldaps scheme")]
    StartTlsOverLdaps,
}

/// Failure reported by a directory client operation
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Transport, protocol, or timeout error from the LDAP library
    #[error("{0}")]
    Ldap(#[from] ldap3::LdapError),

    /// The directory answered with a non-success result code
    #[error("directory returned result code {rc}: {text}")]
    Rejected { rc: u32, text: String },
}

impl DirectoryError {
    /// LDAP result code 49
    pub const INVALID_CREDENTIALS: u32 = 49;

    pub fn rejected(rc: u32, text: impl Into<String>) -> Self {
        Self::Rejected {
            rc,
            text: text.into(),
        }
    }

    /// Result code when the directory rejected the operation
    pub fn result_code(&self) -> Option<u32> {
        match self {
            DirectoryError::Rejected { rc, .. } => Some(*rc),
            DirectoryError::Ldap(_) => None,
        }
    }
}

/// Authentication failure, classified by the step that failed
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to connect to directory at {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: DirectoryError,
    },

    #[error("Service account bind failed for {bind_dn:?}: {source}")]
    ServiceBind {
        bind_dn: String,
        #[source]
        source: DirectoryError,
    },

    #[error("User search failed: {0}")]
    Search(#[source] DirectoryError),

    #[error("Search user DN does not exist or too many entries returned")]
    AmbiguousOrMissingUser,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(#[source] DirectoryError),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Connection { .. } => "ConnectionError",
            AuthError::ServiceBind { .. } => "ServiceBindError",
            AuthError::Search(_) => "SearchError",
            AuthError::AmbiguousOrMissingUser => "AmbiguousOrMissingUserError",
            AuthError::InvalidCredentials(_) => "InvalidCredentialsError",
        }
    }

    /// Last stage reached before the failure
    pub fn stage(&self) -> AuthStage {
        match self {
            AuthError::Connection { .. } => AuthStage::Idle,
            AuthError::ServiceBind { .. } => AuthStage::Connected,
            AuthError::Search(_) => AuthStage::ServiceBound,
            AuthError::AmbiguousOrMissingUser => AuthStage::Searched,
            AuthError::InvalidCredentials(_) => AuthStage::Validated,
        }
    }

    /// True when the user was refused, as opposed to the directory or its
    /// configuration failing
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::AmbiguousOrMissingUser | AuthError::InvalidCredentials(_)
        )
    }

    /// Underlying directory failure, if any
    pub fn directory_error(&self) -> Option<&DirectoryError> {
        match self {
            AuthError::Connection { source, .. } | AuthError::ServiceBind { source, .. } => {
                Some(source)
            }
            AuthError::Search(source) | AuthError::InvalidCredentials(source) => Some(source),
            AuthError::AmbiguousOrMissingUser => None,
        }
    }
}
