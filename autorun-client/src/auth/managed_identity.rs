//! Managed identity credential (instance metadata service)

use async_trait::async_trait;
use reqwest::Client;

use super::{AccessToken, Credential, CredentialError, TokenResponse, rejected};

const NAME: &str = "ManagedIdentityCredential";

/// Token endpoint of the Azure instance metadata service
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";

/// Authenticates as the managed identity of the host
///
/// With no `client_id` the host's system-assigned (or only user-assigned)
/// identity is used. A `client_id` selects a specific user-assigned
/// identity and is sent to the endpoint unchanged.
pub struct ManagedIdentityCredential {
    client: Client,
    endpoint: String,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(client: Client, client_id: Option<String>) -> Self {
        Self::with_endpoint(client, IMDS_ENDPOINT, client_id)
    }

    pub fn with_endpoint(
        client: Client,
        endpoint: impl Into<String>,
        client_id: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            client_id,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    fn query(&self, scope: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("api-version", IMDS_API_VERSION.to_string()),
            ("resource", scope_to_resource(scope).to_string()),
        ];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }
        query
    }
}

/// IMDS wants a resource URI rather than a `/.default` scope
pub(crate) fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix(".default").unwrap_or(scope)
}

#[async_trait]
impl Credential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&self.query(scope))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    CredentialError::Unavailable {
                        credential: NAME,
                        message: format!("metadata endpoint unreachable: {}", e),
                    }
                } else {
                    CredentialError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(rejected(NAME, response).await);
        }

        let body: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| CredentialError::InvalidResponse {
                    credential: NAME,
                    message: e.to_string(),
                })?;
        body.into_access_token(NAME)
    }
}
