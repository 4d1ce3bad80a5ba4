//! Scheduling layer
//!
//! Drives a submitted job to a terminal state by polling the control
//! plane on a fixed interval under a cumulative budget.

pub mod poller;

pub use poller::{JobPoller, PollOutcome};
