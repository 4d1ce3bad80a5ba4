//! Autorun HTTP Client
//!
//! A type-safe client for the Azure Automation control plane plus the
//! credentials used to authenticate against it.
//!
//! The runner only depends on the [`ControlPlane`] trait, so the HTTP
//! implementation here can be swapped for an in-memory one in tests.
//!
//! # Example
//!
//! ```no_run
//! use autorun_client::{AutomationClient, AuthSession, ControlPlane};
//! use autorun_client::auth::ManagedIdentityCredential;
//! use autorun_core::{AccountScope, AuthStrategy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AutomationClient::new("https://management.azure.com");
//!     let credential = ManagedIdentityCredential::new(reqwest::Client::new(), None);
//!     let session = AuthSession::new(AuthStrategy::ManagedIdentity, Box::new(credential));
//!
//!     let scope = AccountScope::new("sub", "rg", "account");
//!     let job = client.get_job(&session, &scope, "job-id").await?;
//!     println!("status: {}", job.status);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod error;
mod jobs;

// Re-export commonly used types
pub use auth::{AccessToken, AuthSession, Credential, CredentialError, MANAGEMENT_SCOPE};
pub use error::{ClientError, Result};
pub use jobs::{JobMetadata, StreamRecord};

use async_trait::async_trait;
use autorun_core::AccountScope;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// API version sent with every Automation request
pub const AUTOMATION_API_VERSION: &str = "2023-11-01";

/// Operations the runner needs from the control plane
///
/// Every call is a single network round trip with no retry. Failures are
/// reported as-is and the caller decides whether they are fatal.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Creates a job for `runbook_name` under the caller-chosen `job_id`
    async fn create_job(
        &self,
        session: &AuthSession,
        scope: &AccountScope,
        job_id: &str,
        runbook_name: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<JobMetadata>;

    /// Fetches the current status and timestamps of a job
    async fn get_job(
        &self,
        session: &AuthSession,
        scope: &AccountScope,
        job_id: &str,
    ) -> Result<JobMetadata>;

    /// Fetches every stream record of a job, following pagination
    async fn list_job_streams(
        &self,
        session: &AuthSession,
        scope: &AccountScope,
        job_id: &str,
    ) -> Result<Vec<StreamRecord>>;
}

/// HTTP client for the Azure Automation API
#[derive(Debug, Clone)]
pub struct AutomationClient {
    /// Management endpoint (e.g., "https://management.azure.com")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl AutomationClient {
    /// Create a new client against a management endpoint
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use autorun_client::AutomationClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = AutomationClient::with_client("https://management.azure.com", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the management endpoint
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
