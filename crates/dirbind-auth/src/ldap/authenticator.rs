//! Search-then-bind authentication
//!
//! One call runs: connect, service bind, subtree search for the user,
//! check that exactly one entry matched, then bind as that entry with the
//! caller's password. The connection is closed once on every path after a
//! successful connect.

use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::ldap::client::LdapDirectory;
use crate::ldap::directory::{DirectoryClient, DirectoryConnection};
use crate::ldap::error::AuthError;
use crate::ldap::types::{
    AuthStage, AuthenticatorConfig, DirectoryEntry, SearchOutcome, SearchRequest,
    ServiceBindMode,
};
use crate::metrics;

/// Authenticates users by searching for their entry and binding as it
pub struct Authenticator<C> {
    config: AuthenticatorConfig,
    client: C,
}

/// Authenticator over the `ldap3` client
pub type LdapAuthenticator = Authenticator<LdapDirectory>;

impl Authenticator<LdapDirectory> {
    pub fn ldap(config: AuthenticatorConfig) -> Self {
        Self::new(config, LdapDirectory::new())
    }
}

impl<C: DirectoryClient> Authenticator<C> {
    pub fn new(config: AuthenticatorConfig, client: C) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// Authenticate `username` with `password` and return the matched entry.
    ///
    /// Emptiness of either argument is not checked here. An empty service
    /// `bind_password` only changes the service bind to an unauthenticated
    /// one; the final bind always uses `password` as given, so callers must
    /// refuse empty passwords themselves if the directory accepts
    /// unauthenticated binds.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectoryEntry, AuthError> {
        let span = info_span!("auth", username = %username);

        async move {
            let started = Instant::now();
            let result = self.run(username, password).await;
            metrics::record_attempt(&result, started.elapsed());

            match &result {
                Ok(entry) => info!("Authenticated {} as {}", username, entry.dn),
                Err(e) if e.is_rejection() => {
                    warn!("Authentication rejected for {}: {}", username, e)
                }
                Err(e) => error!("Authentication failed for {} at {}: {}", username, e.stage(), e),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, username: &str, password: &str) -> Result<DirectoryEntry, AuthError> {
        let address = self.config.address();

        let mut conn = self
            .client
            .connect(address, self.config.transport())
            .await
            .map_err(|source| AuthError::Connection {
                address: address.to_string(),
                source,
            })?;
        debug!(stage = %AuthStage::Connected, "Connected to {}", address);

        let result = self.run_connected(&mut conn, username, password).await;
        conn.close().await;

        if result.is_ok() {
            debug!(stage = %AuthStage::Done, "Connection released");
        }
        result
    }

    async fn run_connected(
        &self,
        conn: &mut C::Connection,
        username: &str,
        password: &str,
    ) -> Result<DirectoryEntry, AuthError> {
        self.service_bind(conn).await?;
        debug!(stage = %AuthStage::ServiceBound, "Service bind as {:?}", self.config.bind_dn());

        let request = SearchRequest::subtree(
            self.config.base_dn(),
            self.config.filter().render(username),
            self.config.attributes().to_vec(),
        );
        debug!("Searching {} with filter: {}", request.base_dn, request.filter);

        let entries = conn.search(&request).await.map_err(AuthError::Search)?;
        debug!(stage = %AuthStage::Searched, "Search returned {} entries", entries.len());

        let entry = SearchOutcome::from(entries)
            .into_unique()
            .ok_or(AuthError::AmbiguousOrMissingUser)?;
        debug!(stage = %AuthStage::Validated, "Found user DN: {}", entry.dn);

        conn.simple_bind(&entry.dn, password)
            .await
            .map_err(AuthError::InvalidCredentials)?;
        debug!(stage = %AuthStage::UserBound, "User bind succeeded");

        Ok(entry)
    }

    async fn service_bind(&self, conn: &mut C::Connection) -> Result<(), AuthError> {
        let bind_dn = self.config.bind_dn();

        let result = match self.config.service_bind_mode() {
            ServiceBindMode::Unauthenticated => conn.unauthenticated_bind(bind_dn).await,
            ServiceBindMode::Simple => {
                conn.simple_bind(bind_dn, self.config.bind_password()).await
            }
        };

        result.map_err(|source| AuthError::ServiceBind {
            bind_dn: bind_dn.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::error::DirectoryError;
    use crate::ldap::types::{DirectoryAddress, SearchScope, TransportOptions};
    use async_trait::async_trait;
    use dirbind_core::DirectoryConfigSection;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
    use metrics_util::MetricKind;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Connect(String),
        UnauthenticatedBind(String),
        SimpleBind(String, String),
        Search(SearchRequest),
        Close,
    }

    /// In-memory directory that answers searches by exact filter and
    /// records every call made against it
    #[derive(Clone, Default)]
    struct ScriptedDirectory {
        calls: Arc<Mutex<Vec<Call>>>,
        results: HashMap<String, Vec<DirectoryEntry>>,
        passwords: HashMap<String, String>,
        refuse_connect: bool,
        fail_search: bool,
    }

    impl ScriptedDirectory {
        fn with_user(mut self, filter: &str, entry: DirectoryEntry, password: &str) -> Self {
            self.passwords.insert(entry.dn.clone(), password.to_string());
            self.results
                .entry(filter.to_string())
                .or_default()
                .push(entry);
            self
        }

        fn with_account(mut self, dn: &str, password: &str) -> Self {
            self.passwords.insert(dn.to_string(), password.to_string());
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|&c| predicate(c)).count()
        }
    }

    struct ScriptedConnection {
        directory: ScriptedDirectory,
    }

    impl ScriptedConnection {
        fn record(&self, call: Call) {
            self.directory.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl DirectoryClient for ScriptedDirectory {
        type Connection = ScriptedConnection;

        async fn connect(
            &self,
            address: &DirectoryAddress,
            _options: &TransportOptions,
        ) -> Result<Self::Connection, DirectoryError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Connect(address.to_string()));

            if self.refuse_connect {
                let refused =
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
                return Err(DirectoryError::Ldap(refused.into()));
            }

            Ok(ScriptedConnection {
                directory: self.clone(),
            })
        }
    }

    #[async_trait]
    impl DirectoryConnection for ScriptedConnection {
        async fn unauthenticated_bind(&mut self, bind_dn: &str) -> Result<(), DirectoryError> {
            self.record(Call::UnauthenticatedBind(bind_dn.to_string()));
            Ok(())
        }

        async fn simple_bind(&mut self, dn: &str, secret: &str) -> Result<(), DirectoryError> {
            self.record(Call::SimpleBind(dn.to_string(), secret.to_string()));

            match self.directory.passwords.get(dn) {
                Some(expected) if expected == secret => Ok(()),
                _ => Err(DirectoryError::rejected(
                    DirectoryError::INVALID_CREDENTIALS,
                    "Invalid credentials",
                )),
            }
        }

        async fn search(
            &mut self,
            request: &SearchRequest,
        ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
            self.record(Call::Search(request.clone()));

            if self.directory.fail_search {
                return Err(DirectoryError::rejected(32, "No such object"));
            }

            Ok(self
                .directory
                .results
                .get(&request.filter)
                .cloned()
                .unwrap_or_default())
        }

        async fn close(&mut self) {
            self.record(Call::Close);
        }
    }

    const BASE_DN: &str = "dc=example,dc=com";
    const SERVICE_DN: &str = "cn=reader,dc=example,dc=com";
    const ALICE_DN: &str = "uid=alice,ou=people,dc=example,dc=com";

    fn section() -> DirectoryConfigSection {
        DirectoryConfigSection {
            host: "ldap.example.com".to_string(),
            base_dn: BASE_DN.to_string(),
            bind_dn: SERVICE_DN.to_string(),
            user_filter: "(uid=%s)".to_string(),
            ..Default::default()
        }
    }

    fn alice() -> DirectoryEntry {
        DirectoryEntry::new(ALICE_DN)
            .with_attribute("uid", ["alice"])
            .with_attribute("mail", ["alice@example.com"])
    }

    fn directory() -> ScriptedDirectory {
        ScriptedDirectory::default().with_user("(uid=alice)", alice(), "correct-pw")
    }

    fn authenticator(
        section: DirectoryConfigSection,
        directory: &ScriptedDirectory,
    ) -> Authenticator<ScriptedDirectory> {
        let config = AuthenticatorConfig::from_section(&section).unwrap();
        Authenticator::new(config, directory.clone())
    }

    #[tokio::test]
    async fn test_found_user_with_correct_password() {
        let dir = directory();
        let auth = authenticator(section(), &dir);

        let entry = auth.authenticate("alice", "correct-pw").await.unwrap();

        assert_eq!(entry, alice());
        assert_eq!(
            dir.calls(),
            vec![
                Call::Connect("ldap://ldap.example.com:389".to_string()),
                Call::UnauthenticatedBind(SERVICE_DN.to_string()),
                Call::Search(SearchRequest {
                    base_dn: BASE_DN.to_string(),
                    scope: SearchScope::Subtree,
                    filter: "(uid=alice)".to_string(),
                    attributes: vec![],
                }),
                Call::SimpleBind(ALICE_DN.to_string(), "correct-pw".to_string()),
                Call::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_user_is_missing() {
        let dir = directory();
        let auth = authenticator(section(), &dir);

        let err = auth.authenticate("bob", "anything").await.unwrap_err();

        assert!(matches!(err, AuthError::AmbiguousOrMissingUser));
        assert_eq!(dir.count(|c| matches!(c, Call::SimpleBind(..))), 0);
        assert_eq!(dir.count(|c| *c == Call::Close), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let dir = directory();
        let auth = authenticator(section(), &dir);

        let err = auth.authenticate("alice", "wrong-pw").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(
            err.directory_error().and_then(DirectoryError::result_code),
            Some(DirectoryError::INVALID_CREDENTIALS)
        );
        assert_eq!(dir.count(|c| *c == Call::Close), 1);
    }

    #[tokio::test]
    async fn test_empty_bind_password_uses_unauthenticated_bind() {
        let dir = directory();
        let auth = authenticator(section(), &dir);

        auth.authenticate("alice", "correct-pw").await.unwrap();

        assert_eq!(
            dir.count(|c| *c == Call::UnauthenticatedBind(SERVICE_DN.to_string())),
            1
        );
        assert_eq!(
            dir.count(|c| matches!(c, Call::SimpleBind(dn, _) if dn == SERVICE_DN)),
            0
        );
    }

    #[tokio::test]
    async fn test_bind_password_uses_simple_bind() {
        let dir = directory().with_account(SERVICE_DN, "service-pw");
        let mut s = section();
        s.bind_password = "service-pw".to_string();
        let auth = authenticator(s, &dir);

        auth.authenticate("alice", "correct-pw").await.unwrap();

        let calls = dir.calls();
        assert_eq!(
            calls[1],
            Call::SimpleBind(SERVICE_DN.to_string(), "service-pw".to_string())
        );
        assert_eq!(
            dir.count(|c| matches!(c, Call::UnauthenticatedBind(_))),
            0
        );
    }

    #[tokio::test]
    async fn test_rejected_service_bind() {
        let dir = directory().with_account(SERVICE_DN, "service-pw");
        let mut s = section();
        s.bind_password = "stale-pw".to_string();
        let auth = authenticator(s, &dir);

        let err = auth.authenticate("alice", "correct-pw").await.unwrap_err();

        assert!(matches!(err, AuthError::ServiceBind { .. }));
        assert_eq!(err.code(), "ServiceBindError");
        assert_eq!(dir.count(|c| matches!(c, Call::Search(_))), 0);
        assert_eq!(dir.count(|c| *c == Call::Close), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_matches_never_rebind() {
        for count in [2usize, 5] {
            let mut dir = ScriptedDirectory::default();
            for i in 0..count {
                dir = dir.with_user(
                    "(uid=alice)",
                    DirectoryEntry::new(format!("uid=alice,ou=unit{},dc=example,dc=com", i)),
                    "correct-pw",
                );
            }
            let auth = authenticator(section(), &dir);

            let err = auth.authenticate("alice", "correct-pw").await.unwrap_err();

            assert!(matches!(err, AuthError::AmbiguousOrMissingUser));
            assert_eq!(dir.count(|c| matches!(c, Call::SimpleBind(..))), 0);
            assert_eq!(dir.count(|c| *c == Call::Close), 1);
        }
    }

    #[tokio::test]
    async fn test_connect_failure_skips_close() {
        let dir = ScriptedDirectory {
            refuse_connect: true,
            ..directory()
        };
        let auth = authenticator(section(), &dir);

        let err = auth.authenticate("alice", "correct-pw").await.unwrap_err();

        assert!(matches!(err, AuthError::Connection { .. }));
        assert_eq!(err.stage(), AuthStage::Idle);
        assert_eq!(
            dir.calls(),
            vec![Call::Connect("ldap://ldap.example.com:389".to_string())]
        );
    }

    #[tokio::test]
    async fn test_search_failure_releases_connection() {
        let dir = ScriptedDirectory {
            fail_search: true,
            ..directory()
        };
        let auth = authenticator(section(), &dir);

        let err = auth.authenticate("alice", "correct-pw").await.unwrap_err();

        assert!(matches!(err, AuthError::Search(_)));
        assert_eq!(dir.count(|c| matches!(c, Call::SimpleBind(..))), 0);
        assert_eq!(dir.calls().last(), Some(&Call::Close));
    }

    #[tokio::test]
    async fn test_username_is_escaped_in_filter() {
        let dir = directory();
        let auth = authenticator(section(), &dir);

        let err = auth.authenticate("*", "anything").await.unwrap_err();

        assert!(matches!(err, AuthError::AmbiguousOrMissingUser));
        assert!(dir
            .calls()
            .contains(&Call::Search(SearchRequest::subtree(BASE_DN, "(uid=\\2a)", vec![]))));
    }

    #[tokio::test]
    async fn test_password_passed_unmodified() {
        let password = "  pa)(ss*\\word  ";
        let dir = ScriptedDirectory::default().with_user("(uid=alice)", alice(), password);
        let auth = authenticator(section(), &dir);

        auth.authenticate("alice", password).await.unwrap();

        assert!(dir
            .calls()
            .contains(&Call::SimpleBind(ALICE_DN.to_string(), password.to_string())));
    }

    #[tokio::test]
    async fn test_configured_attributes_are_requested() {
        let dir = directory();
        let mut s = section();
        s.attributes = vec!["mail".to_string(), "memberOf".to_string()];
        let auth = authenticator(s, &dir);

        auth.authenticate("alice", "correct-pw").await.unwrap();

        let searched = dir.calls().into_iter().find_map(|c| match c {
            Call::Search(request) => Some(request),
            _ => None,
        });
        assert_eq!(
            searched.map(|r| r.attributes),
            Some(vec!["mail".to_string(), "memberOf".to_string()])
        );
    }

    #[tokio::test]
    async fn test_repeated_calls_have_same_outcome() {
        let dir = directory();
        let auth = authenticator(section(), &dir);

        for _ in 0..3 {
            assert!(auth.authenticate("alice", "correct-pw").await.is_ok());
            assert!(matches!(
                auth.authenticate("alice", "wrong-pw").await,
                Err(AuthError::InvalidCredentials(_))
            ));
            assert!(matches!(
                auth.authenticate("bob", "anything").await,
                Err(AuthError::AmbiguousOrMissingUser)
            ));
        }

        // Every call opened and released its own connection
        assert_eq!(dir.count(|c| matches!(c, Call::Connect(_))), 9);
        assert_eq!(dir.count(|c| *c == Call::Close), 9);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let dir = directory();
        let auth = Arc::new(authenticator(section(), &dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let auth = Arc::clone(&auth);
                tokio::spawn(async move {
                    let password = if i % 2 == 0 { "correct-pw" } else { "wrong-pw" };
                    auth.authenticate("alice", password).await.is_ok()
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 4);
        assert_eq!(dir.count(|c| *c == Call::Close), 8);
    }

    fn attempts_with_outcome(snapshotter: &Snapshotter, outcome: &str) -> u64 {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| {
                key.kind() == MetricKind::Counter
                    && key.key().name() == metrics::names::AUTH_ATTEMPTS_TOTAL
                    && key
                        .key()
                        .labels()
                        .any(|l| l.key() == "outcome" && l.value() == outcome)
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(n) => n,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_attempts_are_counted_by_outcome() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let dir = directory();
        let auth = authenticator(section(), &dir);

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                auth.authenticate("alice", "wrong-pw").await.unwrap_err();
            })
        });
        assert_eq!(attempts_with_outcome(&snapshotter, "InvalidCredentialsError"), 1);
        assert_eq!(attempts_with_outcome(&snapshotter, "success"), 0);

        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                auth.authenticate("alice", "correct-pw").await.unwrap();
            })
        });
        assert_eq!(attempts_with_outcome(&snapshotter, "success"), 1);
    }
}
