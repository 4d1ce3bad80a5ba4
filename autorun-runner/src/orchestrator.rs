//! Trigger-and-monitor orchestration
//!
//! Wires the session provider, submitter, poller, collector and composer
//! into one operation. Once a job exists remotely every outcome is reported
//! as a [`JobResult`]; errors are limited to failures before submission and
//! to cancellation.

use autorun_client::{AuthSession, ControlPlane};
use autorun_core::{AccountScope, AuthStrategy, JobHandle, JobResult, OutputRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::SessionProvider;
use crate::config::Config;
use crate::error::OrchestrationError;
use crate::scheduler::{JobPoller, PollOutcome};
use crate::service::{JobIdSource, JobSubmitter, Outcome, OutputCollector, Submission, compose};

/// One runbook execution to orchestrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub runbook_name: String,
    pub scope: AccountScope,
    pub parameters: BTreeMap<String, String>,
    /// Overrides the configured polling budget
    pub timeout: Option<Duration>,
    /// Overrides the configured polling interval
    pub poll_interval: Option<Duration>,
}

impl TriggerRequest {
    pub fn new(runbook_name: impl Into<String>, scope: AccountScope) -> Self {
        Self {
            runbook_name: runbook_name.into(),
            scope,
            parameters: BTreeMap::new(),
            timeout: None,
            poll_interval: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    sessions: Arc<dyn SessionProvider>,
    control_plane: Arc<dyn ControlPlane>,
    config: Config,
    id_source: Option<JobIdSource>,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        control_plane: Arc<dyn ControlPlane>,
        config: Config,
    ) -> Self {
        Self {
            sessions,
            control_plane,
            config,
            id_source: None,
        }
    }

    /// Replaces the random job ids with ids from `id_source`
    pub fn with_id_source(mut self, id_source: JobIdSource) -> Self {
        self.id_source = Some(id_source);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one runbook to completion on a fresh session
    ///
    /// The request is checked before any credential is built. The session
    /// is closed on every path that returns; dropping the future instead
    /// skips the close.
    pub async fn trigger_and_monitor(
        &self,
        request: TriggerRequest,
        strategy: AuthStrategy,
        cancel: &CancellationToken,
    ) -> Result<JobResult, OrchestrationError> {
        Self::validate(&request)?;

        let session = self.sessions.acquire(strategy).await?;
        let result = self.run(&session, request, cancel).await;
        session.close().await;
        result
    }

    /// Runs several runbooks concurrently on one shared session
    ///
    /// The outer error is reserved for session acquisition. Each request
    /// gets its own entry, in request order.
    pub async fn trigger_many(
        &self,
        requests: Vec<TriggerRequest>,
        strategy: AuthStrategy,
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<JobResult, OrchestrationError>>, OrchestrationError> {
        let mut results: Vec<Option<Result<JobResult, OrchestrationError>>> =
            Vec::with_capacity(requests.len());
        let mut valid = Vec::new();
        for (index, request) in requests.into_iter().enumerate() {
            match Self::validate(&request) {
                Ok(()) => {
                    results.push(None);
                    valid.push((index, request));
                }
                Err(e) => results.push(Some(Err(e))),
            }
        }

        if valid.is_empty() {
            return Ok(results.into_iter().flatten().collect());
        }

        let session = self.sessions.acquire(strategy).await?;
        info!("Orchestrating {} job(s) on one session", valid.len());

        let mut tasks = JoinSet::new();
        for (index, request) in valid {
            let this = self.clone();
            let session = session.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { (index, this.run(&session, request, &cancel).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => error!("Orchestration task failed: {}", e),
            }
        }
        session.close().await;

        Ok(results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(OrchestrationError::TaskFailed(
                        "task ended without a result".to_string(),
                    ))
                })
            })
            .collect())
    }

    /// Submits, monitors and collects one job on an existing session
    ///
    /// The session stays open; closing it is up to the caller.
    pub async fn run(
        &self,
        session: &AuthSession,
        request: TriggerRequest,
        cancel: &CancellationToken,
    ) -> Result<JobResult, OrchestrationError> {
        Self::validate(&request)?;
        let interval = request.poll_interval.unwrap_or(self.config.poll_interval);
        let budget = request.timeout.unwrap_or(self.config.job_timeout);

        let Submission { handle, metadata } = self
            .submitter()
            .submit(
                session,
                &request.runbook_name,
                &request.scope,
                request.parameters,
            )
            .await?;

        let poller = JobPoller::new(self.control_plane.clone(), interval, budget);
        let collector = OutputCollector::new(self.control_plane.clone());

        let (outcome, metadata, output) = match poller.poll(session, &handle, metadata, cancel).await
        {
            PollOutcome::Terminal {
                state, metadata, ..
            } => {
                let output =
                    Self::collect_unless_cancelled(&collector, session, &handle, cancel).await?;
                (Outcome::Reported(state), metadata, output)
            }
            PollOutcome::TimedOut { metadata, .. } => {
                let output =
                    Self::collect_unless_cancelled(&collector, session, &handle, cancel).await?;
                (Outcome::TimedOut { budget }, metadata, output)
            }
            PollOutcome::Failed {
                last_state,
                metadata,
                error,
                ..
            } => {
                let outcome = Outcome::PollingFailed {
                    last_state,
                    error: error.to_string(),
                };
                (outcome, metadata, Vec::new())
            }
            PollOutcome::Cancelled { .. } => {
                warn!(
                    "Job {} left running remotely after cancellation",
                    handle.job_id
                );
                return Err(OrchestrationError::Cancelled {
                    job_id: handle.job_id,
                });
            }
        };

        let result = compose(&handle, &outcome, &metadata, output);
        match &result.error_summary {
            None => info!("Job {} finished: {}", result.job_id, result.final_state),
            Some(summary) => warn!(
                "Job {} finished: {} ({})",
                result.job_id, result.final_state, summary
            ),
        }
        Ok(result)
    }

    async fn collect_unless_cancelled(
        collector: &OutputCollector,
        session: &AuthSession,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<Vec<OutputRecord>, OrchestrationError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Output collection of job {} cancelled", handle.job_id);
                Err(OrchestrationError::Cancelled {
                    job_id: handle.job_id.clone(),
                })
            }
            output = collector.collect(session, handle) => Ok(output),
        }
    }

    fn submitter(&self) -> JobSubmitter {
        let submitter = JobSubmitter::new(self.control_plane.clone());
        match &self.id_source {
            Some(id_source) => submitter.with_id_source(id_source.clone()),
            None => submitter,
        }
    }

    fn validate(request: &TriggerRequest) -> Result<(), OrchestrationError> {
        JobSubmitter::validate(&request.runbook_name, &request.scope)?;
        if request.poll_interval.is_some_and(|d| d.is_zero()) {
            return Err(OrchestrationError::InvalidArgument(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if request.timeout.is_some_and(|d| d.is_zero()) {
            return Err(OrchestrationError::InvalidArgument(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
