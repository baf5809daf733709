use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::FeedError;

/// HTTP GET returning a JSON document.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FeedError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

#[async_trait]
impl JsonTransport for ReqwestTransport {
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FeedError> {
        debug!(url, params = query.len(), "Backend request");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    FeedError::InvalidEndpoint {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                } else {
                    FeedError::NetworkUnavailable {
                        url: url.to_string(),
                        reason: if e.is_timeout() {
                            "request timed out".to_string()
                        } else {
                            e.to_string()
                        },
                    }
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::NetworkUnavailable {
                url: url.to_string(),
                reason: format!("failed to read response: {e}"),
            })?;

        if !status.is_success() {
            return Err(FeedError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        parse_body(url, &body)
    }
}

/// Parse a response body. Bare `NaN`/`Infinity` tokens, which some upstream
/// producers emit, are read as `null`.
pub fn parse_body(url: &str, body: &str) -> Result<Value, FeedError> {
    let parsed = serde_json::from_str::<Value>(body).or_else(|first| {
        match replace_non_finite(body) {
            Cow::Owned(cleaned) => serde_json::from_str(&cleaned),
            Cow::Borrowed(_) => Err(first),
        }
    });
    parsed.map_err(|e| FeedError::MalformedResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Error text from a non-2xx body: `detail`, then `error`, then the raw body.
pub fn error_message(body: &str) -> String {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) {
        for field in ["detail", "error", "message"] {
            if let Some(Value::String(message)) = obj.get(field) {
                return message.clone();
            }
        }
    }
    let body = body.trim();
    match body.char_indices().nth(200) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

fn replace_non_finite(body: &str) -> Cow<'_, str> {
    if !body.contains("NaN") && !body.contains("Infinity") {
        return Cow::Borrowed(body);
    }

    let mut out = String::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = body;

    while let Some(c) = rest.chars().next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            rest = &rest[c.len_utf8()..];
            continue;
        }

        if c == '"' {
            in_string = true;
        } else if let Some(token) = ["-Infinity", "Infinity", "NaN"]
            .into_iter()
            .find(|token| rest.starts_with(token))
        {
            out.push_str("null");
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_tokens_become_null() {
        let value = parse_body(
            "http://x",
            r#"{"gammaFlip": NaN, "a": [Infinity, -Infinity, 1], "note": "NaN stays"}"#,
        )
        .unwrap();
        assert!(value["gammaFlip"].is_null());
        assert_eq!(value["a"], serde_json::json!([null, null, 1]));
        assert_eq!(value["note"], "NaN stays");
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_body("http://x", "<html>oops</html>").unwrap_err();
        assert!(matches!(err, FeedError::MalformedResponse { .. }));
    }

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(
            error_message(r#"{"detail": "No options data available for XYZ"}"#),
            "No options data available for XYZ"
        );
        assert_eq!(
            error_message(r#"{"error": "Failed to fetch options data", "errorType": "KeyError"}"#),
            "Failed to fetch options data"
        );
        assert_eq!(error_message("  Bad Gateway "), "Bad Gateway");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(2));
        let err = transport
            .get_json("http://127.0.0.1:9/health", &[])
            .await
            .unwrap_err();
        assert!(err.is_network(), "unexpected error: {err}");
    }
}
