//! Session-scoped credential lifecycle.
//!
//! A [`Session`] owns at most one [`Credential`] and is passed `&mut` into
//! every manager operation — there is no process-wide credential slot, so
//! the hosting layer maps each user's requests onto their own session and
//! the exclusive borrow is the critical section around the
//! check-expiry-then-refresh-then-store sequence.
//!
//! The status check that can refresh as a side effect returns an
//! [`AuthCheck`] rather than a bare bool, so callers cannot miss that the
//! session may have been mutated underneath them.

use chrono::{DateTime, Duration, Utc};

use crate::config::OauthConfig;
use crate::google::auth::{authorization_url, TokenEndpoint};
use crate::google::{ExchangeError, TokenGrant};

/// Treat a token as expired slightly early so an in-flight request does not
/// cross the real expiry mid-call.
const EXPIRY_SKEW_SECS: i64 = 60;

/// A delegated-access token bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl Credential {
    /// Build a credential from a token-endpoint grant. Refresh responses
    /// omit the refresh token; the prior one stays in force.
    fn from_grant(grant: TokenGrant, prior_refresh_token: Option<String>) -> Self {
        Credential {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or(prior_refresh_token),
            expiry: Utc::now() + Duration::seconds(grant.expires_in as i64),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry <= Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS)
    }

    /// Expired with no refresh token is permanently invalid: the credential
    /// stays around for diagnostics but must never authorize a call.
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Per-user session state: empty at session start, populated by the code
/// exchange, cleared by logout. Never shared across sessions.
#[derive(Debug, Default)]
pub struct Session {
    credential: Option<Credential>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Bearer token for authenticated calls, only while actually valid.
    /// A stale credential left behind by a failed refresh yields `None`.
    pub fn access_token(&self) -> Option<&str> {
        self.credential
            .as_ref()
            .filter(|c| !c.is_expired())
            .map(|c| c.access_token.as_str())
    }
}

/// Outcome of a status check. `Refreshed` flags that the check mutated the
/// session's credential on the way to answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCheck {
    /// Credential present and unexpired; no network call was made.
    Valid,
    /// Credential was expired; one refresh succeeded and the session now
    /// holds the renewed token.
    Refreshed,
    /// No usable credential. Any stale credential is left in place but
    /// must not be reused for authenticated calls.
    Unauthenticated,
}

impl AuthCheck {
    pub fn is_authenticated(self) -> bool {
        !matches!(self, AuthCheck::Unauthenticated)
    }
}

/// Owns the token mechanics so consumers only ask "is this session
/// authenticated" and hand over authorization codes.
pub struct CredentialManager<E> {
    config: OauthConfig,
    endpoint: E,
}

impl<E: TokenEndpoint> CredentialManager<E> {
    pub fn new(config: OauthConfig, endpoint: E) -> Self {
        Self { config, endpoint }
    }

    /// The consent redirect target. Side-effect free and idempotent —
    /// building the URL consumes nothing.
    pub fn authorization_url(&self) -> String {
        authorization_url(&self.config)
    }

    /// Exchange a one-time authorization code and store the resulting
    /// credential in the session.
    ///
    /// Codes are single-use by provider contract: after success the caller
    /// must drop the code from any persisted request state (query
    /// parameters and the like), or an unrelated later action will replay
    /// it and fail with [`ExchangeError::InvalidCode`].
    pub async fn complete_authorization(
        &self,
        session: &mut Session,
        code: &str,
    ) -> Result<Credential, ExchangeError> {
        let grant = self.endpoint.exchange_code(code).await?;
        let credential = Credential::from_grant(grant, None);
        session.credential = Some(credential.clone());
        log::info!("authorization code exchanged, session authenticated");
        Ok(credential)
    }

    /// Answer whether the session is authenticated, refreshing a
    /// refreshable expired credential as a (signalled) side effect.
    ///
    /// May block on one network call in the expired case; callers must
    /// tolerate latency. A failed refresh leaves the stale credential
    /// untouched so its expiry stays inspectable, and reports
    /// [`AuthCheck::Unauthenticated`] — refresh failures never surface as
    /// their own user-facing error.
    pub async fn check(&self, session: &mut Session) -> AuthCheck {
        let Some(credential) = session.credential.as_ref() else {
            return AuthCheck::Unauthenticated;
        };

        if !credential.is_expired() {
            return AuthCheck::Valid;
        }

        let Some(refresh_token) = credential.refresh_token.clone() else {
            log::debug!("credential expired with no refresh token; re-authorization required");
            return AuthCheck::Unauthenticated;
        };

        match self.endpoint.refresh(&refresh_token).await {
            Ok(grant) => {
                session.credential = Some(Credential::from_grant(grant, Some(refresh_token)));
                log::info!("access token refreshed");
                AuthCheck::Refreshed
            }
            Err(e) => {
                log::warn!("token refresh failed: {}", e);
                AuthCheck::Unauthenticated
            }
        }
    }

    /// Clear the session's credential. Idempotent; clearing an empty
    /// session is fine.
    pub fn logout(&self, session: &mut Session) {
        if session.credential.take().is_some() {
            log::info!("session logged out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SPREADSHEETS_READONLY_SCOPE;
    use crate::google::RefreshError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn test_config() -> OauthConfig {
        OauthConfig {
            client_id: "client".to_string(),
            client_secret: Some("secret".to_string()),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uri: "http://localhost:8501/".to_string(),
            scopes: vec![SPREADSHEETS_READONLY_SCOPE.to_string()],
        }
    }

    /// In-memory provider: enforces single-use codes, counts calls, and
    /// can be told to fail refreshes.
    #[derive(Default)]
    struct FakeEndpoint {
        consumed_codes: Mutex<HashSet<String>>,
        exchange_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        fail_refresh: bool,
    }

    #[async_trait]
    impl TokenEndpoint for FakeEndpoint {
        async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ExchangeError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            let mut consumed = self.consumed_codes.lock().unwrap();
            if !consumed.insert(code.to_string()) {
                return Err(ExchangeError::InvalidCode);
            }
            Ok(TokenGrant {
                access_token: format!("access-for-{}", code),
                refresh_token: Some("refresh-1".to_string()),
                expires_in: 3600,
            })
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, RefreshError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh {
                return Err(RefreshError::Expired);
            }
            Ok(TokenGrant {
                access_token: "access-renewed".to_string(),
                refresh_token: None,
                expires_in: 3600,
            })
        }
    }

    fn manager(endpoint: FakeEndpoint) -> CredentialManager<FakeEndpoint> {
        CredentialManager::new(test_config(), endpoint)
    }

    fn expired_credential(refresh_token: Option<&str>) -> Credential {
        Credential {
            access_token: "stale-access".to_string(),
            refresh_token: refresh_token.map(|s| s.to_string()),
            expiry: Utc::now() - Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_empty_session_is_unauthenticated() {
        let mgr = manager(FakeEndpoint::default());
        let mut session = Session::new();

        let check = mgr.check(&mut session).await;
        assert_eq!(check, AuthCheck::Unauthenticated);
        assert!(!check.is_authenticated());
        assert_eq!(mgr.endpoint.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exchange_then_valid_without_network() {
        let mgr = manager(FakeEndpoint::default());
        let mut session = Session::new();

        let credential = mgr
            .complete_authorization(&mut session, "code-1")
            .await
            .unwrap();
        assert_eq!(credential.access_token, "access-for-code-1");
        assert!(credential.is_refreshable());

        let check = mgr.check(&mut session).await;
        assert_eq!(check, AuthCheck::Valid);
        // Unexpired credential answers with zero network calls.
        assert_eq!(mgr.endpoint.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.access_token(), Some("access-for-code-1"));
    }

    #[tokio::test]
    async fn test_same_code_twice_fails_cleanly() {
        let mgr = manager(FakeEndpoint::default());
        let mut session = Session::new();

        assert!(mgr
            .complete_authorization(&mut session, "code-1")
            .await
            .is_ok());
        let second = mgr.complete_authorization(&mut session, "code-1").await;
        assert!(matches!(second, Err(ExchangeError::InvalidCode)));
        // First credential survives the failed replay.
        assert!(session.credential().is_some());
    }

    #[tokio::test]
    async fn test_expired_with_refresh_token_refreshes_once() {
        let mgr = manager(FakeEndpoint::default());
        let mut session = Session::new();
        session.credential = Some(expired_credential(Some("refresh-1")));

        let check = mgr.check(&mut session).await;
        assert_eq!(check, AuthCheck::Refreshed);
        assert!(check.is_authenticated());
        assert_eq!(mgr.endpoint.refresh_calls.load(Ordering::SeqCst), 1);

        let credential = session.credential().unwrap();
        assert_eq!(credential.access_token, "access-renewed");
        assert!(!credential.is_expired());
        // Refresh response had no refresh token; the prior one is kept.
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_stale_credential() {
        let endpoint = FakeEndpoint {
            fail_refresh: true,
            ..Default::default()
        };
        let mgr = manager(endpoint);
        let mut session = Session::new();
        let stale = expired_credential(Some("refresh-1"));
        session.credential = Some(stale.clone());

        let check = mgr.check(&mut session).await;
        assert_eq!(check, AuthCheck::Unauthenticated);
        assert_eq!(mgr.endpoint.refresh_calls.load(Ordering::SeqCst), 1);
        // Stale credential kept byte-for-byte for diagnosability...
        assert_eq!(session.credential(), Some(&stale));
        // ...but never handed out for authenticated calls.
        assert_eq!(session.access_token(), None);
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_is_permanent() {
        let mgr = manager(FakeEndpoint::default());
        let mut session = Session::new();
        session.credential = Some(expired_credential(None));

        let check = mgr.check(&mut session).await;
        assert_eq!(check, AuthCheck::Unauthenticated);
        // No refresh attempt is even made.
        assert_eq!(mgr.endpoint.refresh_calls.load(Ordering::SeqCst), 0);
        assert!(session.credential().is_some());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let mgr = manager(FakeEndpoint::default());
        let mut session = Session::new();

        mgr.complete_authorization(&mut session, "code-1")
            .await
            .unwrap();
        mgr.logout(&mut session);
        assert!(session.credential().is_none());

        // Logging out an empty session succeeds too.
        mgr.logout(&mut session);
        assert!(session.credential().is_none());
        assert_eq!(mgr.check(&mut session).await, AuthCheck::Unauthenticated);
    }

    #[test]
    fn test_authorization_url_has_no_side_effects() {
        let mgr = manager(FakeEndpoint::default());
        let first = mgr.authorization_url();
        let second = mgr.authorization_url();
        assert_eq!(first, second);
        assert_eq!(mgr.endpoint.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_expiry_skew() {
        // Expiring 30s from now is already "expired" under the 60s skew.
        let soon = Credential {
            access_token: "t".to_string(),
            refresh_token: None,
            expiry: Utc::now() + Duration::seconds(30),
        };
        assert!(soon.is_expired());

        let later = Credential {
            access_token: "t".to_string(),
            refresh_token: None,
            expiry: Utc::now() + Duration::seconds(3600),
        };
        assert!(!later.is_expired());
    }
}
