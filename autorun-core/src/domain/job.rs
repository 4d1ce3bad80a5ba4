//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::output::OutputRecord;

/// Automation account a job runs in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountScope {
    pub subscription_id: String,
    pub resource_group: String,
    pub automation_account: String,
}

impl AccountScope {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        automation_account: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            automation_account: automation_account.into(),
        }
    }

    /// Name of the first empty component, if any
    pub fn missing_part(&self) -> Option<&'static str> {
        if self.subscription_id.trim().is_empty() {
            Some("subscription_id")
        } else if self.resource_group.trim().is_empty() {
            Some("resource_group")
        } else if self.automation_account.trim().is_empty() {
            Some("automation_account")
        } else {
            None
        }
    }

    /// ARM resource path of the automation account
    pub fn resource_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Automation/automationAccounts/{}",
            self.subscription_id, self.resource_group, self.automation_account
        )
    }
}

impl fmt::Display for AccountScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (subscription {})",
            self.resource_group, self.automation_account, self.subscription_id
        )
    }
}

/// One orchestration attempt, fixed at submission time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub runbook_name: String,
    pub account_scope: AccountScope,
    pub parameters: BTreeMap<String, String>,
}

/// Job lifecycle state
///
/// `Queued` and `Running` are non-terminal. `Completed`, `Failed`,
/// `Suspended` and `Stopped` are terminal states reported by the control
/// plane. `TimedOut` is terminal and only ever produced locally by the
/// poller. `Unknown` carries a status this crate does not recognize and is
/// treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Suspended,
    Stopped,
    TimedOut,
    Unknown(String),
}

impl JobState {
    /// Parses a status string reported by the control plane
    ///
    /// Transitional statuses that precede execution read as `Queued`,
    /// `Resuming` reads as `Running`. The control plane never reports
    /// `TimedOut`, so that value lands in `Unknown` like any other
    /// unrecognized status.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "Queued" | "New" | "Activating" => Self::Queued,
            "Running" | "Resuming" => Self::Running,
            "Completed" => Self::Completed,
            "Failed" => Self::Failed,
            "Suspended" => Self::Suspended,
            "Stopped" => Self::Stopped,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Suspended | Self::Stopped | Self::TimedOut
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Suspended => "Suspended",
            Self::Stopped => "Stopped",
            Self::TimedOut => "TimedOut",
            Self::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        if s == "TimedOut" {
            Self::TimedOut
        } else {
            Self::from_wire(&s)
        }
    }
}

/// Terminal artifact of one orchestration attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub runbook_name: String,
    pub account_scope: AccountScope,
    pub final_state: JobState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_modified_time: Option<DateTime<Utc>>,
    pub provisioning_state: Option<String>,
    pub parameters_used: BTreeMap<String, String>,
    pub output: Vec<OutputRecord>,
    pub error_summary: Option<String>,
}

impl JobResult {
    pub fn succeeded(&self) -> bool {
        self.final_state == JobState::Completed
    }
}
