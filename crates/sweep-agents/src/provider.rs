use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sweep_models::{ChatTurn, ProviderConfig, ProviderKind};

use crate::error::AgentError;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;

/// One model call: a system instruction plus the conversation so far.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub turns: Vec<ChatTurn>,
    /// Structured-output schema, only sent to providers that accept one.
    pub response_schema: Option<Value>,
    /// Ask the provider for a bare JSON object.
    pub json_mode: bool,
}

/// A remote text-completion service.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether a usable API key is present. Without one the provider is
    /// never called.
    fn has_credentials(&self) -> bool;

    fn default_model(&self) -> &str;

    fn supports_response_schema(&self) -> bool {
        false
    }

    /// Return the model's text. Empty output is `EmptyResponse`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError>;
}

/// Build the provider described by `config`.
pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Arc<dyn CompletionProvider> {
    match config.kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config, timeout)),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config, timeout)),
    }
}
