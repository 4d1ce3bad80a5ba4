//! Output collection
//!
//! Turns a job's stream records into [`OutputRecord`]s. Records keep the
//! order the control plane returned them in: streams are written
//! concurrently and their timestamps can be coarse or missing, so sorting
//! by time would invent an order the control plane never reported.

use autorun_client::{AuthSession, ControlPlane, StreamRecord};
use autorun_core::{JobHandle, OutputRecord, StreamKind};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Summary of the placeholder returned for jobs without any stream record
pub const NO_OUTPUT_SUMMARY: &str = "No output stream records were found for this job.";

pub struct OutputCollector {
    control_plane: Arc<dyn ControlPlane>,
}

impl OutputCollector {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    /// Fetches all stream records of a job
    ///
    /// Never fails and never returns an empty list: a failed fetch becomes a
    /// single `Error` record and an empty one a single `Info` placeholder.
    pub async fn collect(&self, session: &AuthSession, handle: &JobHandle) -> Vec<OutputRecord> {
        info!("Fetching output streams for job {}", handle.job_id);

        let streams = match self
            .control_plane
            .list_job_streams(session, &handle.account_scope, &handle.job_id)
            .await
        {
            Ok(streams) => streams,
            Err(e) => {
                error!("Failed to fetch output for job {}: {}", handle.job_id, e);
                return vec![OutputRecord::synthetic(
                    StreamKind::Error,
                    format!("API error fetching job output: {}", e),
                )];
            }
        };

        if streams.is_empty() {
            info!("No output stream records found for job {}", handle.job_id);
            return vec![OutputRecord::synthetic(StreamKind::Info, NO_OUTPUT_SUMMARY)];
        }

        info!(
            "Fetched {} stream record(s) for job {}",
            streams.len(),
            handle.job_id
        );
        streams.into_iter().map(to_output_record).collect()
    }
}

fn to_output_record(stream: StreamRecord) -> OutputRecord {
    let timestamp = stream.time.as_deref().and_then(|raw| {
        let parsed = DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc));
        if parsed.is_err() {
            debug!("Ignoring unparseable stream timestamp '{}'", raw);
        }
        parsed.ok()
    });

    OutputRecord {
        stream_id: stream.id,
        stream_kind: StreamKind::from_wire(stream.stream_type.as_deref().unwrap_or_default()),
        timestamp,
        summary: stream.summary,
        payload: stream.value,
    }
}
