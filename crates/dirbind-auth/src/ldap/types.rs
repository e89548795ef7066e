//! Directory authentication types and configuration
//!
//! Covers:
//! - Validated authenticator configuration and transport options
//! - Directory entries and search requests
//! - Search outcomes and authentication stages

use dirbind_core::{DirectoryConfigSection, DEFAULT_LDAPS_PORT, DEFAULT_LDAP_PORT};
use ldap3::SearchEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::ldap::error::ConfigError;
use crate::ldap::filter::FilterTemplate;

// ============================================================================
// Configuration
// ============================================================================

/// Transport scheme for the directory connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain LDAP, optionally upgraded with STARTTLS
    #[default]
    Ldap,
    /// LDAP over TLS from connection start
    Ldaps,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ldap => "ldap",
            Scheme::Ldaps => "ldaps",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Ldap => DEFAULT_LDAP_PORT,
            Scheme::Ldaps => DEFAULT_LDAPS_PORT,
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Ldaps)
    }
}

impl FromStr for Scheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ldap" => Ok(Scheme::Ldap),
            "ldaps" => Ok(Scheme::Ldaps),
            _ => Err(ConfigError::UnsupportedScheme(s.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport settings handed to the directory client on connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Verify the server certificate chain and host name
    pub verify_server_certificate: bool,
    /// Upgrade a plain connection with STARTTLS
    pub start_tls: bool,
    /// Timeout for establishing the connection
    pub connect_timeout: Duration,
    /// Timeout applied to each bind and search; `None` waits indefinitely
    pub operation_timeout: Option<Duration>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            verify_server_certificate: true,
            start_tls: false,
            connect_timeout: Duration::from_secs(10),
            operation_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Directory URL built from scheme, host and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryAddress {
    url: Url,
}

impl DirectoryAddress {
    pub fn new(scheme: Scheme, host: &str, port: u16) -> Result<Self, ConfigError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }

        // IPv6 literals need brackets inside a URL authority
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };

        let raw = format!("{}://{}:{}", scheme, host, port);
        let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidAddress {
            address: raw.clone(),
            reason: e.to_string(),
        })?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidAddress {
                address: raw,
                reason: "missing host".to_string(),
            });
        }

        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }
}

impl fmt::Display for DirectoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, immutable configuration for one [`Authenticator`](crate::Authenticator).
#[derive(Clone)]
pub struct AuthenticatorConfig {
    scheme: Scheme,
    address: DirectoryAddress,
    base_dn: String,
    bind_dn: String,
    bind_password: String,
    filter: FilterTemplate,
    attributes: Vec<String>,
    transport: TransportOptions,
}

impl AuthenticatorConfig {
    /// Build and validate a configuration from its plain-value section.
    ///
    /// Fails on an unknown scheme, an empty host or base DN, port 0,
    /// STARTTLS over `ldaps`, or a filter template without exactly one
    /// username placeholder.
    pub fn from_section(section: &DirectoryConfigSection) -> Result<Self, ConfigError> {
        let scheme: Scheme = section.scheme.parse()?;
        let port = section.port.unwrap_or_else(|| scheme.default_port());
        if port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        let address = DirectoryAddress::new(scheme, &section.host, port)?;

        if section.base_dn.trim().is_empty() {
            return Err(ConfigError::MissingBaseDn);
        }

        let filter = FilterTemplate::parse(&section.user_filter)?;

        if section.start_tls && scheme.is_secure() {
            return Err(ConfigError::StartTlsOverLdaps);
        }

        // Zero disables the operation timeout only; connects always have a bound
        let timeout = (section.timeout_seconds > 0)
            .then(|| Duration::from_secs(section.timeout_seconds));
        let transport = TransportOptions {
            verify_server_certificate: !section.skip_tls_verify,
            start_tls: section.start_tls,
            connect_timeout: timeout.unwrap_or(TransportOptions::default().connect_timeout),
            operation_timeout: timeout,
        };

        if !transport.verify_server_certificate {
            warn!(
                "TLS certificate verification is disabled for {}; use only for testing",
                address
            );
        }

        Ok(Self {
            scheme,
            address,
            base_dn: section.base_dn.clone(),
            bind_dn: section.bind_dn.clone(),
            bind_password: section.bind_password.clone(),
            filter,
            attributes: section.attributes.clone(),
            transport,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn address(&self) -> &DirectoryAddress {
        &self.address
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    pub fn bind_password(&self) -> &str {
        &self.bind_password
    }

    pub fn filter(&self) -> &FilterTemplate {
        &self.filter
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn transport(&self) -> &TransportOptions {
        &self.transport
    }

    /// Which service bind the authenticator performs
    pub fn service_bind_mode(&self) -> ServiceBindMode {
        if self.bind_password.is_empty() {
            ServiceBindMode::Unauthenticated
        } else {
            ServiceBindMode::Simple
        }
    }
}

impl fmt::Debug for AuthenticatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorConfig")
            .field("address", &self.address.as_str())
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("bind_mode", &self.service_bind_mode())
            .field("filter", &self.filter.as_str())
            .field("attributes", &self.attributes)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Service account bind performed before the user search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceBindMode {
    /// Bind DN only, no secret. Directories treat this as anonymous.
    Unauthenticated,
    /// Bind DN and password
    Simple,
}

impl ServiceBindMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceBindMode::Unauthenticated => "unauthenticated",
            ServiceBindMode::Simple => "simple",
        }
    }
}

// ============================================================================
// Directory entries and searches
// ============================================================================

/// A directory entry returned by a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name
    pub dn: String,

    /// Text attributes; values keep the order the directory returned
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,

    /// Attributes whose values are not valid UTF-8
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub binary_attributes: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
            binary_attributes: HashMap::new(),
        }
    }

    /// Set an attribute, replacing any previous values under that name
    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Get first value of an attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Get all values of an attribute
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
            binary_attributes: entry.bin_attrs,
        }
    }
}

/// Search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    Base,
    OneLevel,
    #[default]
    Subtree,
}

impl From<SearchScope> for ldap3::Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => ldap3::Scope::Base,
            SearchScope::OneLevel => ldap3::Scope::OneLevel,
            SearchScope::Subtree => ldap3::Scope::Subtree,
        }
    }
}

/// A search sent to the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: SearchScope,
    pub filter: String,
    /// Requested attributes; empty requests all user attributes
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// Whole-subtree search below `base_dn`
    pub fn subtree(
        base_dn: impl Into<String>,
        filter: impl Into<String>,
        attributes: Vec<String>,
    ) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope: SearchScope::Subtree,
            filter: filter.into(),
            attributes,
        }
    }
}

/// Cardinality of a user search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Missing,
    Unique(DirectoryEntry),
    Ambiguous(usize),
}

impl SearchOutcome {
    pub fn len(&self) -> usize {
        match self {
            SearchOutcome::Missing => 0,
            SearchOutcome::Unique(_) => 1,
            SearchOutcome::Ambiguous(count) => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SearchOutcome::Missing)
    }

    /// The matched entry, only when exactly one was found
    pub fn into_unique(self) -> Option<DirectoryEntry> {
        match self {
            SearchOutcome::Unique(entry) => Some(entry),
            _ => None,
        }
    }
}

impl From<Vec<DirectoryEntry>> for SearchOutcome {
    fn from(mut entries: Vec<DirectoryEntry>) -> Self {
        match entries.len() {
            0 => SearchOutcome::Missing,
            1 => entries
                .pop()
                .map_or(SearchOutcome::Missing, SearchOutcome::Unique),
            n => SearchOutcome::Ambiguous(n),
        }
    }
}

// ============================================================================
// Authentication stages
// ============================================================================

/// Progress of a single authentication call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Idle,
    Connected,
    ServiceBound,
    Searched,
    Validated,
    UserBound,
    Done,
}

impl AuthStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStage::Idle => "idle",
            AuthStage::Connected => "connected",
            AuthStage::ServiceBound => "service_bound",
            AuthStage::Searched => "searched",
            AuthStage::Validated => "validated",
            AuthStage::UserBound => "user_bound",
            AuthStage::Done => "done",
        }
    }
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
