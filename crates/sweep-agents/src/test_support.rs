//! Scripted provider for exercising the adapter and orchestrator offline.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use sweep_models::ProviderKind;

use crate::error::AgentError;
use crate::provider::{CompletionProvider, CompletionRequest};

/// Replays queued results in order. Once the script runs out every call
/// fails with a transport error.
pub struct ScriptedProvider {
    kind: ProviderKind,
    credentials: bool,
    schema: bool,
    default_model: String,
    script: Mutex<VecDeque<Result<String, AgentError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            credentials: true,
            schema: true,
            default_model: format!("{kind}-default"),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentials = false;
        self
    }

    pub fn without_schema(mut self) -> Self {
        self.schema = false;
        self
    }

    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(text.to_string()));
        self
    }

    pub fn fail(self, error: AgentError) -> Self {
        self.push(Err(error));
        self
    }

    /// Queue `n` transport failures.
    pub fn fail_times(self, n: usize) -> Self {
        for _ in 0..n {
            self.push(Err(self.transport_error()));
        }
        self
    }

    /// Number of `complete` calls so far.
    pub fn attempts(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn push(&self, item: Result<String, AgentError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
    }

    fn transport_error(&self) -> AgentError {
        AgentError::Transport {
            provider: self.kind,
            message: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn has_credentials(&self) -> bool {
        self.credentials
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn supports_response_schema(&self) -> bool {
        self.schema
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Err(self.transport_error()))
    }
}
