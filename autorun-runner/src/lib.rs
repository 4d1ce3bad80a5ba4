//! Autorun engine
//!
//! Triggers Azure Automation runbooks and follows them to completion.
//!
//! Architecture:
//! - Auth: strategy selection and validated sessions
//! - Services: job submission, output collection, result composition
//! - Scheduler: status polling under an interval and a budget
//! - Orchestrator: the trigger-and-monitor operation built from the above
//!
//! Once a job has been created remotely the engine always reports a
//! [`JobResult`](autorun_core::JobResult), even when polling or output
//! retrieval failed, so the job id is never lost.

pub mod auth;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use auth::{AzureCredentialFactory, CredentialFactory, CredentialSessionProvider, SessionProvider};
pub use config::{AuthConfig, Config};
pub use error::OrchestrationError;
pub use orchestrator::{Orchestrator, TriggerRequest};
