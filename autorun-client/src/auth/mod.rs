//! Credentials and authenticated sessions
//!
//! A [`Credential`] knows how to obtain access tokens from one identity
//! source. An [`AuthSession`] wraps a credential for the lifetime of one or
//! more orchestrations: it caches the bearer token, refreshes it shortly
//! before expiry and can be cloned freely across tasks.

mod azure_cli;
mod chain;
mod client_secret;
mod managed_identity;

pub use azure_cli::AzureCliCredential;
pub use chain::DefaultCredential;
pub use client_secret::ClientSecretCredential;
pub use managed_identity::ManagedIdentityCredential;

use async_trait::async_trait;
use autorun_core::AuthStrategy;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Default scope of the Azure Resource Manager API
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Tokens are refreshed when they have less than this left
const REFRESH_MARGIN_SECS: i64 = 300;

/// Errors raised while obtaining a token
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The identity source cannot be used in this environment
    #[error("{credential} unavailable: {message}")]
    Unavailable {
        credential: &'static str,
        message: String,
    },

    /// The token endpoint answered with an error status
    #[error("{credential} rejected (status {status}): {message}")]
    Rejected {
        credential: &'static str,
        status: u16,
        message: String,
    },

    /// HTTP request to the token endpoint failed
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The token endpoint answered with something that is not a token
    #[error("{credential} returned an invalid token response: {message}")]
    InvalidResponse {
        credential: &'static str,
        message: String,
    },

    /// Every credential of a chain failed
    #[error("no credential in the chain succeeded: {}", .0.join("; "))]
    Exhausted(Vec<String>),

    /// The session was released
    #[error("session has been closed")]
    Closed,
}

/// Bearer token with its expiry
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    fn expires_within(&self, margin: Duration) -> bool {
        self.expires_on - margin <= Utc::now()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// A source of access tokens
#[async_trait]
pub trait Credential: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Obtains a token for `scope`
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;

    /// Releases any resources held by the credential
    async fn close(&self) {}
}

/// Authenticated session shared by orchestrations
///
/// Cloning is cheap and every clone shares one token cache. The owner must
/// call [`AuthSession::close`] once it is done with the session; after that
/// no further tokens are handed out.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    strategy: AuthStrategy,
    credential: Box<dyn Credential>,
    cached: Mutex<Option<AccessToken>>,
    closed: AtomicBool,
}

impl AuthSession {
    pub fn new(strategy: AuthStrategy, credential: Box<dyn Credential>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                strategy,
                credential,
                cached: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.inner.strategy
    }

    /// Name of the credential backing this session
    pub fn credential_name(&self) -> &'static str {
        self.inner.credential.name()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns a bearer token for the management scope
    ///
    /// The cached token is reused until it is close to expiry. Concurrent
    /// callers wait on the same refresh instead of each hitting the token
    /// endpoint.
    pub async fn bearer_token(&self) -> Result<String, CredentialError> {
        if self.is_closed() {
            return Err(CredentialError::Closed);
        }

        let mut cached = self.inner.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.expires_within(Duration::seconds(REFRESH_MARGIN_SECS)) {
                return Ok(token.token.clone());
            }
        }

        debug!(
            "Requesting token from {} credential",
            self.inner.credential.name()
        );
        let token = self.inner.credential.get_token(MANAGEMENT_SCOPE).await?;
        let secret = token.token.clone();
        *cached = Some(token);
        Ok(secret)
    }

    /// Releases the session
    ///
    /// Safe to call more than once; only the first call reaches the
    /// credential.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.cached.lock().await.take();
        self.inner.credential.close().await;
        debug!("Closed {} session", self.inner.credential.name());
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("strategy", &self.inner.strategy)
            .field("credential", &self.inner.credential.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Token endpoint responses
// =============================================================================

/// Body returned by the Entra ID and IMDS token endpoints
///
/// IMDS sends the expiry fields as strings, Entra ID as numbers.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    expires_in: Option<serde_json::Value>,
    expires_on: Option<serde_json::Value>,
}

impl TokenResponse {
    pub(crate) fn into_access_token(
        self,
        credential: &'static str,
    ) -> Result<AccessToken, CredentialError> {
        let expires_on = if let Some(on) = self.expires_on.as_ref().and_then(as_seconds) {
            DateTime::from_timestamp(on, 0)
        } else if let Some(secs) = self.expires_in.as_ref().and_then(as_seconds) {
            Some(Utc::now() + Duration::seconds(secs))
        } else {
            None
        };

        let expires_on = expires_on.ok_or_else(|| CredentialError::InvalidResponse {
            credential,
            message: "missing or unreadable token expiry".to_string(),
        })?;

        Ok(AccessToken::new(self.access_token, expires_on))
    }
}

fn as_seconds(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads an error body from a token endpoint into a `Rejected` error
pub(crate) async fn rejected(
    credential: &'static str,
    response: reqwest::Response,
) -> CredentialError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    CredentialError::Rejected {
        credential,
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingCredential {
        calls: Arc<AtomicUsize>,
        lifetime: Duration,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Credential for CountingCredential {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
            assert_eq!(scope, MANAGEMENT_SCOPE);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken::new(
                format!("token-{}", n),
                Utc::now() + self.lifetime,
            ))
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn session(lifetime: Duration) -> (AuthSession, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let credential = CountingCredential {
            calls: calls.clone(),
            lifetime,
            closes: closes.clone(),
        };
        (
            AuthSession::new(AuthStrategy::Default, Box::new(credential)),
            calls,
            closes,
        )
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let (session, calls, _) = session(Duration::hours(1));
        assert_eq!(session.bearer_token().await.unwrap(), "token-0");
        assert_eq!(session.clone().bearer_token().await.unwrap(), "token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed() {
        let (session, calls, _) = session(Duration::seconds(60));
        session.bearer_token().await.unwrap();
        assert_eq!(session.bearer_token().await.unwrap(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let (session, _, closes) = session(Duration::hours(1));
        session.close().await;
        session.close().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(session.is_closed());
        assert!(matches!(
            session.bearer_token().await,
            Err(CredentialError::Closed)
        ));
    }

    #[test]
    fn test_token_response_numeric_expiry() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "abc"
        }))
        .unwrap();
        let token = response.into_access_token("test").unwrap();
        assert_eq!(token.token, "abc");
        assert!(token.expires_on > Utc::now() + Duration::minutes(59));
    }

    #[test]
    fn test_token_response_string_expiry() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "abc",
            "expires_in": "86399",
            "expires_on": "1893456000"
        }))
        .unwrap();
        let token = response.into_access_token("test").unwrap();
        assert_eq!(token.expires_on.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_token_response_without_expiry() {
        let response: TokenResponse =
            serde_json::from_value(serde_json::json!({"access_token": "abc"})).unwrap();
        assert!(matches!(
            response.into_access_token("test"),
            Err(CredentialError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_access_token_debug_redacts_secret() {
        let token = AccessToken::new("super-secret", Utc::now());
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}
