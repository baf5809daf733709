use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sweep_models::{ChatRole, ProviderConfig, ProviderKind};
use tracing::debug;

use crate::error::AgentError;
use crate::http::{build_client, post_json};
use crate::provider::{CompletionProvider, CompletionRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI chat-completions client.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Self {
        let mut provider = Self::new(config.resolve_api_key(), timeout);
        if let Some(base) = &config.base_url {
            provider.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = &config.default_model {
            provider.default_model = model.clone();
        }
        provider
    }
}

pub(crate) fn request_body(request: &CompletionRequest) -> Value {
    let mut messages = vec![json!({"role": "system", "content": request.system})];
    messages.extend(request.turns.iter().map(|turn| {
        let role = match turn.role {
            ChatRole::User => "user",
            ChatRole::Model => "assistant",
        };
        json!({"role": role, "content": turn.text})
    }));

    let mut body = json!({
        "model": request.model,
        "messages": messages,
    });
    if request.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

pub(crate) fn response_text(response: &Value) -> Option<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AgentError::Configuration("OpenAI API key is not set".to_string())
        })?;

        debug!(model = %request.model, turns = request.turns.len(), "Calling OpenAI");
        let builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(api_key);
        let response = post_json(ProviderKind::OpenAi, builder, &request_body(request)).await?;

        response_text(&response).ok_or(AgentError::EmptyResponse(ProviderKind::OpenAi))
    }
}
