//! Orchestration errors
//!
//! Everything here is reported instead of a `JobResult`. Failures that
//! happen after a job exists remotely (polling errors, timeouts, output
//! retrieval) are folded into the result instead, so the job id is never
//! lost; the only exception is a cancellation requested by the caller.

use autorun_core::{AuthStrategy, InvalidStrategy};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Malformed or missing input, detected before any I/O
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    InvalidStrategy(#[from] InvalidStrategy),

    /// The strategy needs environment values that are not set
    #[error("missing configuration for '{strategy}' auth: {} must be set", .missing.join(", "))]
    MissingConfiguration {
        strategy: AuthStrategy,
        missing: Vec<&'static str>,
    },

    /// A credential was built but could not produce a token
    #[error("authentication failed for '{strategy}' auth ({credential}): {detail}")]
    Authentication {
        strategy: AuthStrategy,
        credential: &'static str,
        detail: String,
    },

    /// The control plane refused to create the job
    #[error("submission of job '{job_id}' rejected{}: {message}", status_suffix(.status))]
    Submission {
        job_id: String,
        status: Option<u16>,
        message: String,
    },

    /// The caller abandoned the orchestration; the remote job is left as is
    #[error("orchestration of job '{job_id}' was cancelled")]
    Cancelled { job_id: String },

    /// A bulk orchestration task ended without producing a result
    #[error("orchestration task failed: {0}")]
    TaskFailed(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" (status {})", s))
        .unwrap_or_default()
}

impl OrchestrationError {
    /// True when no job was created on the control plane
    pub fn before_submission(&self) -> bool {
        !matches!(self, Self::Cancelled { .. } | Self::TaskFailed(_))
    }
}
