//! Automation job endpoints

use async_trait::async_trait;
use autorun_core::AccountScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::auth::AuthSession;
use crate::error::Result;
use crate::{AUTOMATION_API_VERSION, AutomationClient, ControlPlane};

/// Job record as reported by the control plane
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobMetadata {
    pub name: Option<String>,
    /// Raw status string, interpreted by the runner
    pub status: String,
    pub provisioning_state: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_modified_time: Option<DateTime<Utc>>,
    /// Exception text recorded for failed, suspended or stopped jobs
    pub exception: Option<String>,
}

impl JobMetadata {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Default::default()
        }
    }
}

/// One stream record, kept close to the wire
///
/// `time` stays a raw string: the control plane sometimes sends values that
/// are coarse or do not parse, and the runner decides what to do with them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRecord {
    pub id: Option<String>,
    pub stream_type: Option<String>,
    pub time: Option<String>,
    pub summary: Option<String>,
    pub value: Option<serde_json::Value>,
}

/// Upper bound on stream pages fetched for one job
const MAX_STREAM_PAGES: usize = 1000;

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateJobBody<'a> {
    properties: CreateJobProperties<'a>,
}

#[derive(Debug, Serialize)]
struct CreateJobProperties<'a> {
    runbook: RunbookRef<'a>,
    parameters: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct RunbookRef<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    name: Option<String>,
    #[serde(default)]
    properties: JobProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JobProperties {
    status: Option<String>,
    provisioning_state: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    creation_time: Option<DateTime<Utc>>,
    last_modified_time: Option<DateTime<Utc>>,
    exception: Option<String>,
}

impl From<JobEnvelope> for JobMetadata {
    fn from(envelope: JobEnvelope) -> Self {
        let props = envelope.properties;
        Self {
            name: envelope.name,
            status: props.status.unwrap_or_default(),
            provisioning_state: props.provisioning_state,
            start_time: props.start_time,
            end_time: props.end_time,
            creation_time: props.creation_time,
            last_modified_time: props.last_modified_time,
            exception: props.exception.filter(|e| !e.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamPage {
    #[serde(default)]
    value: Vec<StreamEnvelope>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    id: Option<String>,
    #[serde(default)]
    properties: StreamProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StreamProperties {
    job_stream_id: Option<String>,
    stream_type: Option<String>,
    time: Option<serde_json::Value>,
    summary: Option<String>,
    value: Option<serde_json::Value>,
}

impl From<StreamEnvelope> for StreamRecord {
    fn from(envelope: StreamEnvelope) -> Self {
        let props = envelope.properties;
        Self {
            id: props.job_stream_id.or(envelope.id),
            stream_type: props.stream_type,
            time: props.time.and_then(|t| match t {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            }),
            summary: props.summary,
            value: props.value.filter(|v| !is_empty_value(v)),
        }
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl AutomationClient {
    fn job_url(&self, scope: &AccountScope, job_id: &str) -> String {
        format!("{}{}/jobs/{}", self.base_url, scope.resource_path(), job_id)
    }

    fn streams_url(&self, scope: &AccountScope, job_id: &str) -> String {
        format!("{}/streams", self.job_url(scope, job_id))
    }
}

#[async_trait]
impl ControlPlane for AutomationClient {
    async fn create_job(
        &self,
        session: &AuthSession,
        scope: &AccountScope,
        job_id: &str,
        runbook_name: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<JobMetadata> {
        let url = self.job_url(scope, job_id);
        let token = session.bearer_token().await?;
        let body = CreateJobBody {
            properties: CreateJobProperties {
                runbook: RunbookRef { name: runbook_name },
                parameters,
            },
        };

        let response = self
            .client
            .put(&url)
            .query(&[("api-version", AUTOMATION_API_VERSION)])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let envelope: JobEnvelope = self.handle_response(response).await?;
        Ok(envelope.into())
    }

    async fn get_job(
        &self,
        session: &AuthSession,
        scope: &AccountScope,
        job_id: &str,
    ) -> Result<JobMetadata> {
        let url = self.job_url(scope, job_id);
        let token = session.bearer_token().await?;

        let response = self
            .client
            .get(&url)
            .query(&[("api-version", AUTOMATION_API_VERSION)])
            .bearer_auth(token)
            .send()
            .await?;

        let envelope: JobEnvelope = self.handle_response(response).await?;
        Ok(envelope.into())
    }

    async fn list_job_streams(
        &self,
        session: &AuthSession,
        scope: &AccountScope,
        job_id: &str,
    ) -> Result<Vec<StreamRecord>> {
        let mut records = Vec::new();

        let first = self
            .client
            .get(self.streams_url(scope, job_id))
            .query(&[("api-version", AUTOMATION_API_VERSION)])
            .bearer_auth(session.bearer_token().await?)
            .send()
            .await?;
        let mut page: StreamPage = self.handle_response(first).await?;
        let mut seen = HashSet::new();

        loop {
            records.extend(page.value.into_iter().map(StreamRecord::from));

            // nextLink already carries the api-version and continuation token
            let Some(next) = page.next_link.filter(|link| !link.is_empty()) else {
                break;
            };
            if seen.len() + 1 >= MAX_STREAM_PAGES {
                warn!(
                    "Stopping stream paging for job {} after {} pages",
                    job_id, MAX_STREAM_PAGES
                );
                break;
            }
            if !seen.insert(next.clone()) {
                warn!("Stream page link for job {} repeated, stopping", job_id);
                break;
            }
            debug!("Following stream page link for job {}", job_id);
            let response = self
                .client
                .get(&next)
                .bearer_auth(session.bearer_token().await?)
                .send()
                .await?;
            page = self.handle_response(response).await?;
        }

        Ok(records)
    }
}
