//! Service layer
//!
//! Services implement one step each of a job's lifecycle on top of the
//! control plane: submitting the job, collecting its output and composing
//! the final result. The poller that sits between submission and
//! collection lives in the scheduler layer.

mod collector;
mod composer;
mod submitter;

pub use collector::OutputCollector;
pub use composer::{Outcome, compose};
pub use submitter::{JobIdSource, JobSubmitter, Submission};
