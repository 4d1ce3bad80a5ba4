//! Runner configuration
//!
//! Defines the tunable parameters of the orchestration engine (polling
//! cadence, budgets, endpoints) and the credential material read from the
//! environment.

use std::time::Duration;

/// Default Azure Resource Manager endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Default Entra ID authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Runner configuration
///
/// All intervals are configurable so tests and slow automation accounts can
/// tune them without code changes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed wait between two status fetches of a job
    pub poll_interval: Duration,

    /// Cumulative polling budget before a job is reported as timed out
    pub job_timeout: Duration,

    /// Per-request network timeout, independent of the polling budget
    pub http_timeout: Duration,

    /// Azure Resource Manager base URL
    pub management_endpoint: String,

    /// Entra ID authority used by the service principal credential
    pub authority_host: String,

    /// Subscription used when a caller does not name one
    pub subscription_id: Option<String>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            job_timeout: Duration::from_secs(900), // 15 minutes
            http_timeout: Duration::from_secs(30),
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            subscription_id: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables:
    /// - AUTORUN_POLL_INTERVAL (optional, seconds, default: 10)
    /// - AUTORUN_JOB_TIMEOUT (optional, seconds, default: 900)
    /// - AUTORUN_HTTP_TIMEOUT (optional, seconds, default: 30)
    /// - AUTORUN_MANAGEMENT_ENDPOINT (optional)
    /// - AUTORUN_AUTHORITY_HOST (optional)
    /// - AZURE_SUBSCRIPTION_ID (optional)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads values through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::new();

        let seconds = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| anyhow::anyhow!("{} must be a number of seconds, got '{}'", key, raw)),
                None => Ok(default),
            }
        };

        let config = Self {
            poll_interval: seconds("AUTORUN_POLL_INTERVAL", defaults.poll_interval)?,
            job_timeout: seconds("AUTORUN_JOB_TIMEOUT", defaults.job_timeout)?,
            http_timeout: seconds("AUTORUN_HTTP_TIMEOUT", defaults.http_timeout)?,
            management_endpoint: lookup("AUTORUN_MANAGEMENT_ENDPOINT")
                .unwrap_or(defaults.management_endpoint),
            authority_host: lookup("AUTORUN_AUTHORITY_HOST").unwrap_or(defaults.authority_host),
            subscription_id: lookup("AZURE_SUBSCRIPTION_ID").filter(|s| !s.trim().is_empty()),
        };

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.job_timeout.is_zero() {
            anyhow::bail!("job_timeout must be greater than 0");
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("http_timeout must be greater than 0");
        }

        for (name, url) in [
            ("management_endpoint", &self.management_endpoint),
            ("authority_host", &self.authority_host),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Credential material read from the environment
///
/// Values are kept verbatim; the session provider decides which of them a
/// strategy needs.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Selects a user-assigned managed identity
    pub managed_identity_client_id: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            tenant_id: lookup("AZURE_TENANT_ID"),
            client_id: lookup("AZURE_CLIENT_ID"),
            client_secret: lookup("AZURE_CLIENT_SECRET"),
            managed_identity_client_id: lookup("AZURE_MANAGED_IDENTITY_CLIENT_ID"),
        }
    }

    /// Environment variables a service principal needs but does not have
    pub fn missing_service_principal_vars(&self) -> Vec<&'static str> {
        [
            ("AZURE_TENANT_ID", &self.tenant_id),
            ("AZURE_CLIENT_ID", &self.client_id),
            ("AZURE_CLIENT_SECRET", &self.client_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("managed_identity_client_id", &self.managed_identity_client_id)
            .finish()
    }
}
