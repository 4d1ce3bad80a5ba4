//! Default credential chain

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

use super::{AccessToken, Credential, CredentialError};

const NAME: &str = "DefaultCredential";

/// Tries each credential in order until one yields a token
///
/// The first credential that succeeds is remembered and used alone for
/// later requests, so a working source is not retried behind failing
/// ones on every refresh.
pub struct DefaultCredential {
    sources: Vec<Box<dyn Credential>>,
    selected: Mutex<Option<usize>>,
}

impl DefaultCredential {
    pub fn new(sources: Vec<Box<dyn Credential>>) -> Self {
        Self {
            sources,
            selected: Mutex::new(None),
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    fn selected(&self) -> Option<usize> {
        self.selected.lock().ok().and_then(|guard| *guard)
    }

    fn select(&self, index: usize) {
        if let Ok(mut guard) = self.selected.lock() {
            *guard = Some(index);
        }
    }
}

#[async_trait]
impl Credential for DefaultCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        if let Some(index) = self.selected() {
            return self.sources[index].get_token(scope).await;
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for (index, source) in self.sources.iter().enumerate() {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!("{} selected {}", NAME, source.name());
                    self.select(index);
                    return Ok(token);
                }
                Err(e) => {
                    debug!("{} skipped {}: {}", NAME, source.name(), e);
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        Err(CredentialError::Exhausted(failures))
    }

    async fn close(&self) {
        for source in &self.sources {
            source.close().await;
        }
    }
}
