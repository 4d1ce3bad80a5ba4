//! Service principal credential (client credentials grant)

use async_trait::async_trait;
use reqwest::Client;

use super::{AccessToken, Credential, CredentialError, TokenResponse, rejected};

const NAME: &str = "ClientSecretCredential";

/// Authenticates as an application registration with a client secret
pub struct ClientSecretCredential {
    client: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        client: Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let authority_host = authority_host.into();
        Self {
            client,
            authority_host: authority_host.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, self.tenant_id)
    }
}

#[async_trait]
impl Credential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .client
            .post(self.token_url())
            .form(&form)
            .send()
            .await?;

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
