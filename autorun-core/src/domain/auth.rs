//! Authentication strategy tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How the session provider obtains credentials for the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthStrategy {
    /// Environment service principal, then Azure CLI, then managed identity
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Client-secret credential read from the environment
    #[serde(rename = "spn")]
    ServicePrincipal,
    /// Managed identity, optionally a user-assigned one
    #[serde(rename = "identity")]
    ManagedIdentity,
}

/// Returned when a strategy name is not one of the known tags
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid auth strategy '{0}', expected 'default', 'spn' or 'identity'")]
pub struct InvalidStrategy(pub String);

impl AuthStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ServicePrincipal => "spn",
            Self::ManagedIdentity => "identity",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthStrategy {
    type Err = InvalidStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "spn" | "service_principal" => Ok(Self::ServicePrincipal),
            "identity" | "managed_identity" => Ok(Self::ManagedIdentity),
            _ => Err(InvalidStrategy(s.to_string())),
        }
    }
}
