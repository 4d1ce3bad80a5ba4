//! Job poller
//!
//! Fetches the status of one submitted job until it reaches a terminal
//! state, the budget runs out, a status call fails, or the caller cancels.
//! A job already terminal on submission is not polled at all. Otherwise the
//! first fetch is immediate, later fetches are one interval apart and the
//! last sleep is clamped so the loop ends exactly at the budget.

use autorun_client::{AuthSession, ClientError, ControlPlane, JobMetadata};
use autorun_core::{JobHandle, JobState};
use std::sync::Arc;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a polling loop ended
#[derive(Debug)]
pub enum PollOutcome {
    /// The control plane reported a terminal state
    Terminal {
        state: JobState,
        metadata: JobMetadata,
        polls: u32,
    },
    /// The budget elapsed while the job was still non-terminal
    TimedOut {
        last_state: JobState,
        metadata: JobMetadata,
        polls: u32,
    },
    /// A status call failed; `metadata` is the last one successfully fetched
    Failed {
        last_state: JobState,
        metadata: JobMetadata,
        error: ClientError,
        polls: u32,
    },
    Cancelled { polls: u32 },
}

impl PollOutcome {
    /// Number of status calls that completed
    pub fn polls(&self) -> u32 {
        match self {
            Self::Terminal { polls, .. }
            | Self::TimedOut { polls, .. }
            | Self::Failed { polls, .. }
            | Self::Cancelled { polls } => *polls,
        }
    }
}

pub struct JobPoller {
    control_plane: Arc<dyn ControlPlane>,
    interval: Duration,
    budget: Duration,
}

impl JobPoller {
    pub fn new(control_plane: Arc<dyn ControlPlane>, interval: Duration, budget: Duration) -> Self {
        Self {
            control_plane,
            interval,
            budget,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Polls `handle` until the loop ends
    ///
    /// `initial` is the job record returned on submission; it stands in as
    /// the last known metadata until the first fetch succeeds.
    pub async fn poll(
        &self,
        session: &AuthSession,
        handle: &JobHandle,
        initial: JobMetadata,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        info!(
            "Monitoring job {} (interval: {:?}, budget: {:?})",
            handle.job_id, self.interval, self.budget
        );

        let started = Instant::now();
        let mut polls = 0;
        let mut last_state = JobState::from_wire(&initial.status);
        if last_state.is_terminal() {
            info!(
                "Job {} already {} on submission, nothing to poll",
                handle.job_id, last_state
            );
            return PollOutcome::Terminal {
                state: last_state,
                metadata: initial,
                polls: 0,
            };
        }
        let mut metadata = initial;

        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Monitoring of job {} cancelled", handle.job_id);
                    return PollOutcome::Cancelled { polls };
                }
                fetched = self.control_plane.get_job(session, &handle.account_scope, &handle.job_id) => fetched,
            };
            polls += 1;

            metadata = match fetched {
                Ok(fetched) => fetched,
                Err(error) => {
                    warn!(
                        "Status call {} for job {} failed: {}",
                        polls, handle.job_id, error
                    );
                    return PollOutcome::Failed {
                        last_state,
                        metadata,
                        error,
                        polls,
                    };
                }
            };

            let state = JobState::from_wire(&metadata.status);
            if let JobState::Unknown(raw) = &state {
                warn!(
                    "Job {} reported unrecognized status '{}', still waiting",
                    handle.job_id, raw
                );
            }
            if state != last_state {
                info!("Job {} status: {} -> {}", handle.job_id, last_state, state);
            } else {
                debug!("Job {} still {} after {} poll(s)", handle.job_id, state, polls);
            }
            last_state = state;

            if last_state.is_terminal() {
                info!(
                    "Job {} reached terminal status {} after {} poll(s)",
                    handle.job_id, last_state, polls
                );
                return PollOutcome::Terminal {
                    state: last_state,
                    metadata,
                    polls,
                };
            }

            let elapsed = started.elapsed();
            if elapsed >= self.budget {
                warn!(
                    "Job {} still {} after {:?}, giving up",
                    handle.job_id, last_state, self.budget
                );
                return PollOutcome::TimedOut {
                    last_state,
                    metadata,
                    polls,
                };
            }

            let wait = self.interval.min(self.budget - elapsed);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Monitoring of job {} cancelled", handle.job_id);
                    return PollOutcome::Cancelled { polls };
                }
                _ = time::sleep(wait) => {}
            }
        }
    }
}
