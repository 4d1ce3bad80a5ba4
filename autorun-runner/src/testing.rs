//! In-memory doubles for the control plane and credentials

use async_trait::async_trait;
use autorun_client::{
    AccessToken, AuthSession, ClientError, ControlPlane, Credential, CredentialError, JobMetadata,
    StreamRecord,
};
use autorun_core::{AccountScope, AuthStrategy};
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted answer of the control plane
#[derive(Debug, Clone)]
pub enum Reply {
    Status(&'static str),
    Metadata(JobMetadata),
    Fail(u16, &'static str),
}

impl Reply {
    fn into_result(self) -> Result<JobMetadata, ClientError> {
        match self {
            Reply::Status(status) => Ok(JobMetadata::with_status(status)),
            Reply::Metadata(meta) => Ok(meta),
            Reply::Fail(status, message) => Err(ClientError::api_error(status, message)),
        }
    }
}

/// Control plane that answers from a script
///
/// Status replies are consumed in order; the last one repeats forever.
pub struct ScriptedControlPlane {
    create: Mutex<Reply>,
    statuses: Mutex<VecDeque<Reply>>,
    streams: Mutex<Result<Vec<StreamRecord>, (u16, &'static str)>>,
    stream_delay: Mutex<Option<std::time::Duration>>,
    pub created: Mutex<Vec<(String, String, BTreeMap<String, String>)>>,
    pub create_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
}

impl ScriptedControlPlane {
    pub fn new(statuses: Vec<Reply>) -> Self {
        Self {
            create: Mutex::new(Reply::Status("New")),
            statuses: Mutex::new(statuses.into()),
            streams: Mutex::new(Ok(Vec::new())),
            stream_delay: Mutex::new(None),
            created: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_create(self, reply: Reply) -> Self {
        *self.create.lock().unwrap() = reply;
        self
    }

    pub fn with_streams(self, records: Vec<StreamRecord>) -> Self {
        *self.streams.lock().unwrap() = Ok(records);
        self
    }

    pub fn with_stream_failure(self, status: u16, message: &'static str) -> Self {
        *self.streams.lock().unwrap() = Err((status, message));
        self
    }

    /// Makes every stream fetch take `delay` before answering
    pub fn with_stream_delay(self, delay: std::time::Duration) -> Self {
        *self.stream_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn stream_fetches(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn create_job(
        &self,
        session: &AuthSession,
        _scope: &AccountScope,
        job_id: &str,
        runbook_name: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<JobMetadata, ClientError> {
        session.bearer_token().await?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push((
            job_id.to_string(),
            runbook_name.to_string(),
            parameters.clone(),
        ));
        self.create.lock().unwrap().clone().into_result()
    }

    async fn get_job(
        &self,
        session: &AuthSession,
        _scope: &AccountScope,
        _job_id: &str,
    ) -> Result<JobMetadata, ClientError> {
        session.bearer_token().await?;
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().cloned()
            }
        };
        reply
            .unwrap_or(Reply::Fail(500, "no scripted status"))
            .into_result()
    }

    async fn list_job_streams(
        &self,
        session: &AuthSession,
        _scope: &AccountScope,
        _job_id: &str,
    ) -> Result<Vec<StreamRecord>, ClientError> {
        session.bearer_token().await?;
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.stream_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match &*self.streams.lock().unwrap() {
            Ok(records) => Ok(records.clone()),
            Err((status, message)) => Err(ClientError::api_error(*status, *message)),
        }
    }
}

/// Credential that hands out a fixed token, or fails
pub struct StaticCredential {
    pub token_calls: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub failure: Option<&'static str>,
}

impl StaticCredential {
    pub fn ok() -> Self {
        Self {
            token_calls: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            failure: None,
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Self::ok()
        }
    }
}

#[async_trait]
impl Credential for StaticCredential {
    fn name(&self) -> &'static str {
        "StaticCredential"
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(message) => Err(CredentialError::Rejected {
                credential: "StaticCredential",
                status: 401,
                message: message.to_string(),
            }),
            None => Ok(AccessToken::new("test-token", Utc::now() + Duration::hours(1))),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A ready-to-use session backed by [`StaticCredential`]
pub fn session() -> AuthSession {
    AuthSession::new(AuthStrategy::Default, Box::new(StaticCredential::ok()))
}

pub fn scope() -> AccountScope {
    AccountScope::new("sub-1", "rg-automation", "aa-ops")
}

pub fn stream(kind: &str, summary: &str) -> StreamRecord {
    StreamRecord {
        id: None,
        stream_type: Some(kind.to_string()),
        time: Some("2024-05-01T10:00:00+00:00".to_string()),
        summary: Some(summary.to_string()),
        value: None,
    }
}
