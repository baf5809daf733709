use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use sweep_models::ProviderKind;
use tracing::debug;

use crate::error::AgentError;

pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a JSON POST and decode the JSON reply, classifying failures.
pub(crate) async fn post_json(
    provider: ProviderKind,
    request: RequestBuilder,
    body: &Value,
) -> Result<Value, AgentError> {
    let response = request.json(body).send().await.map_err(|e| {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        };
        AgentError::Transport { provider, message }
    })?;

    let status = response.status();
    let text = response.text().await.map_err(|e| AgentError::Transport {
        provider,
        message: format!("failed to read response body: {e}"),
    })?;
    debug!(provider = %provider, status = status.as_u16(), len = text.len(), "Provider responded");

    if !status.is_success() {
        return Err(AgentError::Http {
            provider,
            status: status.as_u16(),
            message: error_message(&text),
        });
    }

    serde_json::from_str(&text)
        .map_err(|e| AgentError::Parse(format!("{provider} returned invalid JSON: {e}")))
}

/// Pull the human-readable message out of an error body. Both providers
/// nest it under `error.message`.
pub(crate) fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| v.get("error").and_then(Value::as_str))
            .map(str::to_string)
    });
    from_json.unwrap_or_else(|| body.trim().chars().take(200).collect())
}
