//! Directory client abstraction
//!
//! The authenticator talks to the directory only through these traits. The
//! production implementation is [`LdapDirectory`](crate::LdapDirectory).

use async_trait::async_trait;

use crate::ldap::error::DirectoryError;
use crate::ldap::types::{DirectoryAddress, DirectoryEntry, SearchRequest, TransportOptions};

/// Opens directory connections. Must be safe to call concurrently.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    type Connection: DirectoryConnection;

    async fn connect(
        &self,
        address: &DirectoryAddress,
        options: &TransportOptions,
    ) -> Result<Self::Connection, DirectoryError>;
}

/// A single open connection, owned by one authentication call.
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Bind with a DN and no secret
    async fn unauthenticated_bind(&mut self, bind_dn: &str) -> Result<(), DirectoryError>;

    async fn simple_bind(&mut self, dn: &str, secret: &str) -> Result<(), DirectoryError>;

    async fn search(&mut self, request: &SearchRequest)
        -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Release the connection. Idempotent.
    async fn close(&mut self);
}
