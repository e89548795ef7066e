//! Directory authentication for Dirbind

pub mod ldap;
pub mod metrics;

pub use ldap::{
    AuthError, AuthStage, Authenticator, AuthenticatorConfig, ConfigError, DirectoryAddress,
    DirectoryClient, DirectoryConnection, DirectoryEntry, DirectoryError, FilterTemplate,
    LdapAuthenticator, LdapDirectory, Scheme, SearchOutcome, SearchRequest, SearchScope,
    ServiceBindMode, TransportOptions,
};
