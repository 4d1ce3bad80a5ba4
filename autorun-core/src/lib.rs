//! Autorun Core
//!
//! Core types shared by the Autorun crates.
//!
//! This crate contains:
//! - Domain types: jobs, lifecycle states, output records and results
//! - Authentication strategy tags understood by the session provider

pub mod domain;

pub use domain::auth::{AuthStrategy, InvalidStrategy};
pub use domain::job::{AccountScope, JobHandle, JobResult, JobState};
pub use domain::output::{OutputRecord, StreamKind};
