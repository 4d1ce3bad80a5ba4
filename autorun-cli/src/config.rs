//! Configuration module
//!
//! Settings shared by every command, resolved once from flags and the
//! environment.

use anyhow::Result;
use autorun_core::{AccountScope, AuthStrategy};
use autorun_runner::{Orchestrator, TriggerRequest};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-invocation CLI context
pub struct Context {
    pub orchestrator: Orchestrator,
    pub scope: AccountScope,
    pub strategy: AuthStrategy,
    pub timeout: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub json: bool,
    /// Cancelled on Ctrl-C
    pub cancel: CancellationToken,
}

impl Context {
    /// Builds a request for `runbook` carrying the CLI-wide overrides
    pub fn request(&self, runbook: &str) -> TriggerRequest {
        TriggerRequest {
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            ..TriggerRequest::new(runbook, self.scope.clone())
        }
    }
}

/// Builds the account scope, failing on any missing part
pub fn resolve_scope(
    subscription: Option<String>,
    resource_group: &str,
    automation_account: &str,
) -> Result<AccountScope> {
    let Some(subscription) = subscription else {
        anyhow::bail!("No subscription given: pass --subscription or set AZURE_SUBSCRIPTION_ID");
    };

    let scope = AccountScope::new(subscription, resource_group, automation_account);
    if let Some(part) = scope.missing_part() {
        anyhow::bail!("Automation account {} must not be empty", part);
    }
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_scope() {
        let scope = resolve_scope(Some("sub-1".to_string()), "rg-automation", "aa-ops").unwrap();
        assert_eq!(scope, AccountScope::new("sub-1", "rg-automation", "aa-ops"));
    }

    #[test]
    fn test_resolve_scope_requires_subscription() {
        let err = resolve_scope(None, "rg", "aa").unwrap_err();
        assert!(err.to_string().contains("AZURE_SUBSCRIPTION_ID"));
    }

    #[test]
    fn test_resolve_scope_rejects_blank_parts() {
        let err = resolve_scope(Some("sub-1".to_string()), "rg", " ").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Automation account automation_account must not be empty"
        );
    }
}
