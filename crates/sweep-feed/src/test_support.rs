//! Scripted transport and health check for exercising the feed without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FeedError;
use crate::selector::HealthCheck;
use crate::transport::JsonTransport;

/// What a [`MockTransport`] route answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Json(Value),
    Unreachable,
    Http { status: u16, message: String },
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub query: Vec<(String, String)>,
}

/// Transport that answers by exact URL and records every request.
/// Unrouted URLs behave like an unreachable host.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(String, MockReply)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, url: &str, body: Value) -> Self {
        self.with_reply(url, MockReply::Json(body))
    }

    pub fn with_reply(self, url: &str, reply: MockReply) -> Self {
        self.set_reply(url, reply);
        self
    }

    /// Replace (or add) the reply for `url`.
    pub fn set_reply(&self, url: &str, reply: MockReply) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.retain(|(route, _)| route != url);
            routes.push((url.to_string(), reply));
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl JsonTransport for MockTransport {
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, FeedError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                url: url.to_string(),
                query: query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
        }

        let reply = self.routes.lock().ok().and_then(|routes| {
            routes
                .iter()
                .find(|(route, _)| route == url)
                .map(|(_, reply)| reply.clone())
        });

        match reply {
            Some(MockReply::Json(body)) => Ok(body),
            Some(MockReply::Http { status, message }) => Err(FeedError::Http { status, message }),
            Some(MockReply::Malformed) => Err(FeedError::MalformedResponse {
                url: url.to_string(),
                reason: "expected value at line 1 column 1".to_string(),
            }),
            Some(MockReply::Unreachable) | None => Err(FeedError::NetworkUnavailable {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

/// Health check with a fixed answer and optional latency.
pub struct MockHealthCheck {
    healthy: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockHealthCheck {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::healthy()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheck for MockHealthCheck {
    async fn check(&self, _base_url: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.healthy
    }
}
