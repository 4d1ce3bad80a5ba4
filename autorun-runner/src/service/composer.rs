//! Result composition
//!
//! Pure aggregation of a finished orchestration into a [`JobResult`]. No
//! I/O and no clock reads: the same inputs always give the same result.

use autorun_client::JobMetadata;
use autorun_core::{JobHandle, JobResult, JobState, OutputRecord, StreamKind};
use std::time::Duration;

use crate::service::collector::NO_OUTPUT_SUMMARY;

/// How monitoring of a submitted job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The control plane reported this state
    Reported(JobState),
    /// The polling budget ran out first
    TimedOut { budget: Duration },
    /// A status fetch failed; `last_state` is the last one observed
    PollingFailed { last_state: JobState, error: String },
}

impl Outcome {
    pub fn final_state(&self) -> JobState {
        match self {
            Self::Reported(state) => state.clone(),
            Self::TimedOut { .. } => JobState::TimedOut,
            Self::PollingFailed { last_state, .. } => last_state.clone(),
        }
    }

    /// Summary for any outcome other than a completed job
    fn error_summary(&self, job_id: &str, metadata: &JobMetadata) -> String {
        match self {
            Self::Reported(state @ (JobState::Failed | JobState::Suspended | JobState::Stopped)) => {
                metadata
                    .exception
                    .clone()
                    .unwrap_or_else(|| format!("Job ended with status: {}.", state))
            }
            Self::Reported(state) => format!("Job ended in an unexpected state: {}", state),
            Self::TimedOut { budget } => format!(
                "Job '{}' monitoring timed out after {} seconds.",
                job_id,
                budget.as_secs_f64()
            ),
            Self::PollingFailed { last_state, error } => format!(
                "Polling job '{}' failed after last known status {}: {}",
                job_id, last_state, error
            ),
        }
    }
}

/// Builds the result of one orchestration
///
/// `metadata` is the job record from the last successful fetch and supplies
/// the timestamps. An empty `output` is replaced by the informational
/// placeholder so results never carry an empty record list. After a polling
/// failure `output` is ignored and the result carries one `Error` record
/// repeating the summary.
pub fn compose(
    handle: &JobHandle,
    outcome: &Outcome,
    metadata: &JobMetadata,
    output: Vec<OutputRecord>,
) -> JobResult {
    let final_state = outcome.final_state();
    let error_summary = if final_state == JobState::Completed {
        None
    } else {
        Some(outcome.error_summary(&handle.job_id, metadata))
    };

    let output = match (outcome, &error_summary) {
        (Outcome::PollingFailed { .. }, Some(summary)) => {
            vec![OutputRecord::synthetic(StreamKind::Error, summary.clone())]
        }
        _ if output.is_empty() => {
            vec![OutputRecord::synthetic(StreamKind::Info, NO_OUTPUT_SUMMARY)]
        }
        _ => output,
    };

    JobResult {
        job_id: handle.job_id.clone(),
        runbook_name: handle.runbook_name.clone(),
        account_scope: handle.account_scope.clone(),
        final_state,
        start_time: metadata.start_time,
        end_time: metadata.end_time,
        creation_time: metadata.creation_time,
        last_modified_time: metadata.last_modified_time,
        provisioning_state: metadata.provisioning_state.clone(),
        parameters_used: handle.parameters.clone(),
        output,
        error_summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scope;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn handle() -> JobHandle {
        JobHandle {
            job_id: "abc-1".to_string(),
            runbook_name: "VMPowerStatus".to_string(),
            account_scope: scope(),
            parameters: BTreeMap::from([("VMName".to_string(), "vm01".to_string())]),
        }
    }

    fn metadata(status: &str) -> JobMetadata {
        JobMetadata {
            status: status.to_string(),
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single(),
            end_time: Utc.with_ymd_and_hms(2024, 5, 1, 10, 2, 0).single(),
            ..JobMetadata::default()
        }
    }

    fn output() -> Vec<OutputRecord> {
        vec![OutputRecord::synthetic(StreamKind::Output, "vm01: running")]
    }

    #[test]
    fn test_completed_has_no_error_summary() {
        let result = compose(
            &handle(),
            &Outcome::Reported(JobState::Completed),
            &metadata("Completed"),
            output(),
        );
        assert_eq!(result.final_state, JobState::Completed);
        assert!(result.error_summary.is_none());
        assert_eq!(result.start_time, metadata("Completed").start_time);
        assert_eq!(result.parameters_used, handle().parameters);
    }

    #[test]
    fn test_failed_uses_exception() {
        let mut meta = metadata("Failed");
        meta.exception = Some("Cannot find VM 'vm01'".to_string());
        let result = compose(
            &handle(),
            &Outcome::Reported(JobState::Failed),
            &meta,
            output(),
        );
        assert_eq!(result.error_summary.as_deref(), Some("Cannot find VM 'vm01'"));
    }

    #[test]
    fn test_stopped_without_exception_names_status() {
        let result = compose(
            &handle(),
            &Outcome::Reported(JobState::Stopped),
            &metadata("Stopped"),
            output(),
        );
        assert_eq!(
            result.error_summary.as_deref(),
            Some("Job ended with status: Stopped.")
        );
    }

    #[test]
    fn test_timed_out_names_budget() {
        let result = compose(
            &handle(),
            &Outcome::TimedOut {
                budget: Duration::from_secs(900),
            },
            &metadata("Running"),
            output(),
        );
        assert_eq!(result.final_state, JobState::TimedOut);
        assert_eq!(
            result.error_summary.as_deref(),
            Some("Job 'abc-1' monitoring timed out after 900 seconds.")
        );
    }

    #[test]
    fn test_sub_second_budget_is_not_truncated() {
        let result = compose(
            &handle(),
            &Outcome::TimedOut {
                budget: Duration::from_millis(500),
            },
            &metadata("Running"),
            output(),
        );
        assert_eq!(
            result.error_summary.as_deref(),
            Some("Job 'abc-1' monitoring timed out after 0.5 seconds.")
        );
    }

    #[test]
    fn test_polling_failure_keeps_last_state() {
        let result = compose(
            &handle(),
            &Outcome::PollingFailed {
                last_state: JobState::Running,
                error: "API error (status 502): Bad Gateway".to_string(),
            },
            &metadata("Running"),
            output(),
        );
        assert_eq!(result.final_state, JobState::Running);
        assert_eq!(result.job_id, "abc-1");
        let summary = result.error_summary.unwrap();
        assert_eq!(
            summary,
            "Polling job 'abc-1' failed after last known status Running: \
             API error (status 502): Bad Gateway"
        );
        assert_eq!(result.output.len(), 1);
        assert_eq!(result.output[0].stream_kind, StreamKind::Error);
        assert_eq!(result.output[0].summary.as_deref(), Some(summary.as_str()));
    }

    #[test]
    fn test_error_summary_iff_not_completed() {
        let outcomes = [
            Outcome::Reported(JobState::Completed),
            Outcome::Reported(JobState::Failed),
            Outcome::Reported(JobState::Suspended),
            Outcome::Reported(JobState::Stopped),
            Outcome::Reported(JobState::Unknown("Blocked".to_string())),
            Outcome::TimedOut {
                budget: Duration::from_secs(5),
            },
            Outcome::PollingFailed {
                last_state: JobState::Queued,
                error: "boom".to_string(),
            },
        ];
        for outcome in outcomes {
            let result = compose(&handle(), &outcome, &metadata("x"), output());
            assert_eq!(
                result.error_summary.is_some(),
                result.final_state != JobState::Completed,
                "{:?}",
                outcome
            );
        }
    }

    #[test]
    fn test_empty_output_gets_placeholder() {
        let result = compose(
            &handle(),
            &Outcome::Reported(JobState::Completed),
            &metadata("Completed"),
            Vec::new(),
        );
        assert_eq!(result.output.len(), 1);
        assert_eq!(result.output[0].stream_kind, StreamKind::Info);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let outcome = Outcome::TimedOut {
            budget: Duration::from_secs(60),
        };
        let a = compose(&handle(), &outcome, &metadata("Running"), output());
        let b = compose(&handle(), &outcome, &metadata("Running"), output());
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
