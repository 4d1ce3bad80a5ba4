//! Job submission
//!
//! The job id is generated here, before the creation call, so the job can
//! be addressed for polling even when the creation response is lost.

use autorun_client::{AuthSession, ControlPlane, JobMetadata};
use autorun_core::{AccountScope, JobHandle};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::OrchestrationError;

/// Generates job ids; must never repeat
pub type JobIdSource = Arc<dyn Fn() -> String + Send + Sync>;

/// A job the control plane accepted
#[derive(Debug, Clone)]
pub struct Submission {
    pub handle: JobHandle,
    /// Job record returned by the creation call
    pub metadata: JobMetadata,
}

pub struct JobSubmitter {
    control_plane: Arc<dyn ControlPlane>,
    id_source: JobIdSource,
}

impl JobSubmitter {
    /// Creates a submitter that names jobs with random UUIDs
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            id_source: Arc::new(|| Uuid::new_v4().to_string()),
        }
    }

    pub fn with_id_source(mut self, id_source: JobIdSource) -> Self {
        self.id_source = id_source;
        self
    }

    /// Checks the inputs of a submission without doing any I/O
    pub fn validate(runbook_name: &str, scope: &AccountScope) -> Result<(), OrchestrationError> {
        if runbook_name.trim().is_empty() {
            return Err(OrchestrationError::InvalidArgument(
                "runbook name must not be empty".to_string(),
            ));
        }
        if let Some(part) = scope.missing_part() {
            return Err(OrchestrationError::InvalidArgument(format!(
                "account scope {} must not be empty",
                part
            )));
        }
        Ok(())
    }

    /// Creates the remote job
    ///
    /// No retry: a rejected or failed creation call is returned with the
    /// control plane's status and message untouched.
    pub async fn submit(
        &self,
        session: &AuthSession,
        runbook_name: &str,
        scope: &AccountScope,
        parameters: BTreeMap<String, String>,
    ) -> Result<Submission, OrchestrationError> {
        Self::validate(runbook_name, scope)?;

        let job_id = (self.id_source)();
        info!(
            "Creating job {} for runbook '{}' in {} with {} parameter(s)",
            job_id,
            runbook_name,
            scope,
            parameters.len()
        );

        let metadata = self
            .control_plane
            .create_job(session, scope, &job_id, runbook_name, &parameters)
            .await
            .map_err(|e| {
                error!("Failed to create job {}: {}", job_id, e);
                OrchestrationError::Submission {
                    job_id: job_id.clone(),
                    status: e.status(),
                    message: e.message(),
                }
            })?;

        info!(
            "Job {} created, initial status: {}, provisioning state: {}",
            job_id,
            metadata.status,
            metadata.provisioning_state.as_deref().unwrap_or("unknown")
        );

        Ok(Submission {
            handle: JobHandle {
                job_id,
                runbook_name: runbook_name.to_string(),
                account_scope: scope.clone(),
                parameters,
            },
            metadata,
        })
    }
}
