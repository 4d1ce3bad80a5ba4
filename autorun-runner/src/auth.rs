//! AuthSession provider
//!
//! Turns an [`AuthStrategy`] into a validated [`AuthSession`]. Validation is
//! a single token request against the management scope; a session is only
//! handed out once that request succeeded.

use async_trait::async_trait;
use autorun_client::auth::{
    AzureCliCredential, ClientSecretCredential, DefaultCredential, ManagedIdentityCredential,
};
use autorun_client::{AuthSession, Credential};
use autorun_core::AuthStrategy;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::config::AuthConfig;
use crate::error::OrchestrationError;

/// Produces authenticated sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Acquires and validates a session for `strategy`
    ///
    /// The caller owns the returned session and must close it.
    async fn acquire(&self, strategy: AuthStrategy) -> Result<AuthSession, OrchestrationError>;

    /// Like [`SessionProvider::acquire`], for a strategy given by name
    async fn acquire_named(&self, name: &str) -> Result<AuthSession, OrchestrationError> {
        let strategy: AuthStrategy = name.parse()?;
        self.acquire(strategy).await
    }
}

/// Builds the credential behind each strategy
pub trait CredentialFactory: Send + Sync {
    fn service_principal(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Box<dyn Credential>;

    fn managed_identity(&self, client_id: Option<String>) -> Box<dyn Credential>;

    fn default_chain(&self, auth: &AuthConfig) -> Box<dyn Credential>;
}

/// Factory for the real Azure credentials
#[derive(Debug, Clone)]
pub struct AzureCredentialFactory {
    http: Client,
    authority_host: String,
}

impl AzureCredentialFactory {
    pub fn new(http: Client, authority_host: impl Into<String>) -> Self {
        Self {
            http,
            authority_host: authority_host.into(),
        }
    }
}

impl CredentialFactory for AzureCredentialFactory {
    fn service_principal(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Box<dyn Credential> {
        Box::new(ClientSecretCredential::new(
            self.http.clone(),
            self.authority_host.clone(),
            tenant_id,
            client_id,
            client_secret,
        ))
    }

    fn managed_identity(&self, client_id: Option<String>) -> Box<dyn Credential> {
        Box::new(ManagedIdentityCredential::new(self.http.clone(), client_id))
    }

    fn default_chain(&self, auth: &AuthConfig) -> Box<dyn Credential> {
        Box::new(DefaultCredential::new(self.default_sources(auth)))
    }
}

impl AzureCredentialFactory {
    /// Environment service principal (when complete), Azure CLI, managed identity
    fn default_sources(&self, auth: &AuthConfig) -> Vec<Box<dyn Credential>> {
        let mut sources: Vec<Box<dyn Credential>> = Vec::new();
        if let (Some(tenant), Some(client), Some(secret)) =
            (&auth.tenant_id, &auth.client_id, &auth.client_secret)
        {
            if auth.missing_service_principal_vars().is_empty() {
                sources.push(self.service_principal(tenant, client, secret));
            }
        }
        sources.push(Box::new(AzureCliCredential::new()));
        sources.push(self.managed_identity(auth.managed_identity_client_id.clone()));
        sources
    }
}

/// Session provider backed by a [`CredentialFactory`]
pub struct CredentialSessionProvider<F = AzureCredentialFactory> {
    auth: AuthConfig,
    factory: F,
}

impl<F: CredentialFactory> CredentialSessionProvider<F> {
    pub fn new(auth: AuthConfig, factory: F) -> Self {
        Self { auth, factory }
    }

    /// Builds the credential without touching the network
    fn credential_for(
        &self,
        strategy: AuthStrategy,
    ) -> Result<Box<dyn Credential>, OrchestrationError> {
        match strategy {
            AuthStrategy::ServicePrincipal => {
                let missing = self.auth.missing_service_principal_vars();
                match (&self.auth.tenant_id, &self.auth.client_id, &self.auth.client_secret) {
                    (Some(tenant), Some(client), Some(secret)) if missing.is_empty() => {
                        Ok(self.factory.service_principal(tenant, client, secret))
                    }
                    _ => Err(OrchestrationError::MissingConfiguration { strategy, missing }),
                }
            }
            AuthStrategy::ManagedIdentity => {
                let selector = self.auth.managed_identity_client_id.clone();
                match &selector {
                    Some(id) => debug!("Using user-assigned managed identity {}", id),
                    None => debug!("Using the ambient managed identity"),
                }
                Ok(self.factory.managed_identity(selector))
            }
            AuthStrategy::Default => Ok(self.factory.default_chain(&self.auth)),
        }
    }
}

#[async_trait]
impl<F: CredentialFactory> SessionProvider for CredentialSessionProvider<F> {
    async fn acquire(&self, strategy: AuthStrategy) -> Result<AuthSession, OrchestrationError> {
        info!("Acquiring '{}' session", strategy);

        let credential = self.credential_for(strategy).inspect_err(|e| {
            error!("{}", e);
        })?;
        let session = AuthSession::new(strategy, credential);

        // Fetch a token once so a broken credential fails here and not mid-job
        if let Err(e) = session.bearer_token().await {
            let err = OrchestrationError::Authentication {
                strategy,
                credential: session.credential_name(),
                detail: e.to_string(),
            };
            error!("{}", err);
            session.close().await;
            return Err(err);
        }

        info!(
            "Validated '{}' session via {}",
            strategy,
            session.credential_name()
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticCredential;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records what was built and counts token requests of built credentials
    #[derive(Default)]
    struct RecordingFactory {
        built: Mutex<Vec<String>>,
        token_calls: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        fail_first_token: bool,
    }

    impl RecordingFactory {
        fn credential(&self, label: String) -> Box<dyn Credential> {
            self.built.lock().unwrap().push(label);
            let mut credential = if self.fail_first_token {
                StaticCredential::failing("AADSTS7000215: Invalid client secret provided")
            } else {
                StaticCredential::ok()
            };
            credential.token_calls = self.token_calls.clone();
            credential.closes = self.closes.clone();
            Box::new(credential)
        }

        fn built(&self) -> Vec<String> {
            self.built.lock().unwrap().clone()
        }
    }

    impl CredentialFactory for &RecordingFactory {
        fn service_principal(&self, tenant_id: &str, client_id: &str, _: &str) -> Box<dyn Credential> {
            self.credential(format!("spn:{}:{}", tenant_id, client_id))
        }

        fn managed_identity(&self, client_id: Option<String>) -> Box<dyn Credential> {
            self.credential(format!("identity:{}", client_id.unwrap_or_default()))
        }

        fn default_chain(&self, _auth: &AuthConfig) -> Box<dyn Credential> {
            self.credential("default".to_string())
        }
    }

    fn spn_config(secret: Option<&str>) -> AuthConfig {
        AuthConfig {
            tenant_id: Some("tenant".to_string()),
            client_id: Some("app".to_string()),
            client_secret: secret.map(str::to_string),
            managed_identity_client_id: None,
        }
    }

    #[tokio::test]
    async fn test_missing_secret_fails_without_network() {
        let factory = RecordingFactory::default();
        let provider = CredentialSessionProvider::new(spn_config(None), &factory);

        let err = provider
            .acquire(AuthStrategy::ServicePrincipal)
            .await
            .unwrap_err();

        match err {
            OrchestrationError::MissingConfiguration { strategy, missing } => {
                assert_eq!(strategy, AuthStrategy::ServicePrincipal);
                assert_eq!(missing, vec!["AZURE_CLIENT_SECRET"]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(factory.built().is_empty());
        assert_eq!(factory.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_strategy_name_fails_before_building() {
        let factory = RecordingFactory::default();
        let provider = CredentialSessionProvider::new(spn_config(Some("s")), &factory);

        let err = provider.acquire_named("certificate").await.unwrap_err();

        assert!(matches!(err, OrchestrationError::InvalidStrategy(_)));
        assert!(factory.built().is_empty());
        assert_eq!(factory.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_service_principal_session_fetches_token_once() {
        let factory = RecordingFactory::default();
        let provider = CredentialSessionProvider::new(spn_config(Some("s")), &factory);

        let session = provider.acquire_named("spn").await.unwrap();

        assert_eq!(session.strategy(), AuthStrategy::ServicePrincipal);
        assert_eq!(factory.built(), vec!["spn:tenant:app".to_string()]);
        assert_eq!(factory.token_calls.load(Ordering::SeqCst), 1);

        // The first token is cached for the first real call
        session.bearer_token().await.unwrap();
        assert_eq!(factory.token_calls.load(Ordering::SeqCst), 1);
        session.close().await;
    }

    #[tokio::test]
    async fn test_managed_identity_selector_is_passed_through() {
        let factory = RecordingFactory::default();
        let auth = AuthConfig {
            managed_identity_client_id: Some("0000-user-assigned".to_string()),
            ..Default::default()
        };
        let provider = CredentialSessionProvider::new(auth, &factory);

        provider.acquire(AuthStrategy::ManagedIdentity).await.unwrap();

        assert_eq!(
            factory.built(),
            vec!["identity:0000-user-assigned".to_string()]
        );
    }

    #[tokio::test]
    async fn test_managed_identity_without_selector_uses_ambient_identity() {
        let factory = RecordingFactory::default();
        let provider = CredentialSessionProvider::new(AuthConfig::default(), &factory);

        provider.acquire(AuthStrategy::ManagedIdentity).await.unwrap();

        assert_eq!(factory.built(), vec!["identity:".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_first_token_is_authentication_error_and_closes() {
        let factory = RecordingFactory {
            fail_first_token: true,
            ..Default::default()
        };
        let provider = CredentialSessionProvider::new(AuthConfig::default(), &factory);

        let err = provider.acquire(AuthStrategy::Default).await.unwrap_err();

        match err {
            OrchestrationError::Authentication {
                strategy,
                credential,
                detail,
            } => {
                assert_eq!(strategy, AuthStrategy::Default);
                assert_eq!(credential, "StaticCredential");
                assert!(detail.contains("AADSTS7000215"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    }

    fn source_names(sources: &[Box<dyn Credential>]) -> Vec<&'static str> {
        sources.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_default_chain_order() {
        let factory = AzureCredentialFactory::new(Client::new(), "https://login.example");
        assert_eq!(
            source_names(&factory.default_sources(&spn_config(Some("s")))),
            vec![
                "ClientSecretCredential",
                "AzureCliCredential",
                "ManagedIdentityCredential"
            ]
        );
    }

    #[test]
    fn test_default_chain_skips_incomplete_service_principal() {
        let factory = AzureCredentialFactory::new(Client::new(), "https://login.example");
        assert_eq!(
            source_names(&factory.default_sources(&spn_config(None))),
            vec!["AzureCliCredential", "ManagedIdentityCredential"]
        );
    }
}
