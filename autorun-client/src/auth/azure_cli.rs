//! Azure CLI credential
//!
//! Reuses the login of a developer's `az` session by shelling out to
//! `az account get-access-token`.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;

use super::managed_identity::scope_to_resource;
use super::{AccessToken, Credential, CredentialError};

const NAME: &str = "AzureCliCredential";

#[derive(Debug, Default)]
pub struct AzureCliCredential {
    program: String,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
        }
    }

    /// Uses a different executable, e.g. a full path to `az`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Local time, e.g. "2024-05-01 11:02:03.000000"
    expires_on: Option<String>,
    /// Unix seconds, only printed by newer CLI versions
    #[serde(rename = "expires_on")]
    expires_on_unix: Option<i64>,
}

fn parse_cli_output(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
    let parsed: CliToken =
        serde_json::from_slice(stdout).map_err(|e| CredentialError::InvalidResponse {
            credential: NAME,
            message: e.to_string(),
        })?;

    let expires_on = match (parsed.expires_on_unix, parsed.expires_on.as_deref()) {
        (Some(unix), _) => DateTime::from_timestamp(unix, 0),
        (None, Some(local)) => NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|naive| naive.and_local_timezone(Local).earliest())
            .map(|local| local.with_timezone(&Utc)),
        (None, None) => None,
    }
    .ok_or_else(|| CredentialError::InvalidResponse {
        credential: NAME,
        message: "missing or unreadable token expiry".to_string(),
    })?;

    Ok(AccessToken::new(parsed.access_token, expires_on))
}

#[async_trait]
impl Credential for AzureCliCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--resource"])
            .arg(scope_to_resource(scope))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CredentialError::Unavailable {
                credential: NAME,
                message: format!("failed to run '{}': {}", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CredentialError::Unavailable {
                credential: NAME,
                message: if stderr.is_empty() {
                    format!("'{}' exited with {}", self.program, output.status)
                } else {
                    stderr
                },
            });
        }

        parse_cli_output(&output.stdout)
    }
}
