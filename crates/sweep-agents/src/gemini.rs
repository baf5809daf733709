use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sweep_models::{ChatRole, ProviderConfig, ProviderKind};
use tracing::debug;

use crate::error::AgentError;
use crate::http::{build_client, post_json};
use crate::provider::{CompletionProvider, CompletionRequest};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Google Gemini `generateContent` client.
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
}

impl GeminiProvider {
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

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

pub(crate) fn request_body(request: &CompletionRequest) -> Value {
    let contents: Vec<Value> = request
        .turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            json!({"role": role, "parts": [{"text": turn.text}]})
        })
        .collect();

    let mut generation_config = serde_json::Map::new();
    if request.json_mode {
        generation_config.insert("responseMimeType".into(), json!("application/json"));
    }
    if let Some(schema) = &request.response_schema {
        generation_config.insert("responseSchema".into(), schema.clone());
    }

    let mut body = json!({
        "systemInstruction": {"parts": [{"text": request.system}]},
        "contents": contents,
    });
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }
    body
}

/// Concatenate the text parts of the first candidate.
pub(crate) fn response_text(response: &Value) -> Option<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn supports_response_schema(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AgentError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AgentError::Configuration("Gemini API key is not set".to_string())
        })?;

        debug!(model = %request.model, turns = request.turns.len(), "Calling Gemini");
        let builder = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", api_key);
        let response = post_json(ProviderKind::Gemini, builder, &request_body(request)).await?;

        response_text(&response).ok_or(AgentError::EmptyResponse(ProviderKind::Gemini))
    }
}
