//! Job output domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stream a record was written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Output,
    Warning,
    Error,
    Debug,
    Info,
}

impl StreamKind {
    /// Maps a control-plane stream type onto the closed set of kinds
    pub fn from_wire(stream_type: &str) -> Self {
        match stream_type {
            "Output" => Self::Output,
            "Warning" => Self::Warning,
            "Error" => Self::Error,
            "Debug" | "Verbose" => Self::Debug,
            _ => Self::Info,
        }
    }
}

/// One line of job telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub stream_id: Option<String>,
    pub stream_kind: StreamKind,
    pub timestamp: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl OutputRecord {
    /// A record produced locally rather than fetched from the control plane
    pub fn synthetic(stream_kind: StreamKind, summary: impl Into<String>) -> Self {
        Self {
            stream_id: None,
            stream_kind,
            timestamp: None,
            summary: Some(summary.into()),
            payload: None,
        }
    }
}
