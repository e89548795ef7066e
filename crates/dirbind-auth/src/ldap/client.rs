//! LDAP directory client
//!
//! Opens LDAP, LDAPS, and STARTTLS connections with `ldap3` and exposes them
//! through the [`DirectoryClient`] traits.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapResult, SearchEntry, SearchResult};
use std::time::Duration;
use tracing::debug;

use crate::ldap::directory::{DirectoryClient, DirectoryConnection};
use crate::ldap::error::DirectoryError;
use crate::ldap::types::{DirectoryAddress, DirectoryEntry, SearchRequest, TransportOptions};

/// Requested when a search names no attributes
const ALL_USER_ATTRIBUTES: &str = "*";

/// `ldap3`-backed directory client
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapDirectory;

impl LdapDirectory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectory {
    type Connection = LdapDirectoryConnection;

    async fn connect(
        &self,
        address: &DirectoryAddress,
        options: &TransportOptions,
    ) -> Result<Self::Connection, DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(options.connect_timeout)
            .set_starttls(options.start_tls)
            .set_no_tls_verify(!options.verify_server_certificate);

        debug!("Connecting to LDAP server: {}", address);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, address.as_str()).await?;

        ldap3::drive!(conn);

        Ok(LdapDirectoryConnection {
            ldap,
            operation_timeout: options.operation_timeout,
            closed: false,
        })
    }
}

/// An open `ldap3` connection.
///
/// Dropping it without [`close`](DirectoryConnection::close) still ends the
/// connection driver and the socket; `close` additionally sends an unbind.
pub struct LdapDirectoryConnection {
    ldap: Ldap,
    operation_timeout: Option<Duration>,
    closed: bool,
}

impl LdapDirectoryConnection {
    /// Handle with the per-operation timeout armed for the next request
    fn handle(&mut self) -> &mut Ldap {
        if let Some(timeout) = self.operation_timeout {
            self.ldap.with_timeout(timeout);
        }
        &mut self.ldap
    }
}

#[async_trait]
impl DirectoryConnection for LdapDirectoryConnection {
    async fn unauthenticated_bind(&mut self, bind_dn: &str) -> Result<(), DirectoryError> {
        // A simple bind with an empty password is the unauthenticated form (RFC 4513 5.1.2)
        let result = self.handle().simple_bind(bind_dn, "").await?;
        check_result(result)
    }

    async fn simple_bind(&mut self, dn: &str, secret: &str) -> Result<(), DirectoryError> {
        let result = self.handle().simple_bind(dn, secret).await?;
        check_result(result)
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let attrs: Vec<&str> = if request.attributes.is_empty() {
            vec![ALL_USER_ATTRIBUTES]
        } else {
            request.attributes.iter().map(String::as_str).collect()
        };

        let SearchResult(entries, result) = self
            .handle()
            .search(&request.base_dn, request.scope.into(), &request.filter, attrs)
            .await?;
        check_result(result)?;

        Ok(entries
            .into_iter()
            .map(|entry| DirectoryEntry::from(SearchEntry::construct(entry)))
            .collect())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.ldap.unbind().await {
            debug!("LDAP unbind failed: {}", e);
        }
    }
}

fn check_result(result: LdapResult) -> Result<(), DirectoryError> {
    if result.rc == 0 {
        Ok(())
    } else {
        Err(DirectoryError::Rejected {
            rc: result.rc,
            text: result.text,
        })
    }
}
