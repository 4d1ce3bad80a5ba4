//! Core domain types
//!
//! This module contains the structures shared between the control-plane
//! client (which speaks the wire format) and the runner (which drives the
//! job lifecycle and builds results for callers).

pub mod auth;
pub mod job;
pub mod output;
