use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sweep_models::{BackendKind, FeedConfig, RuntimeMode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Liveness check against a backend's `/health` route.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// True if the backend answered 2xx. Never errors.
    async fn check(&self, base_url: &str) -> bool;
}

pub struct HttpHealthCheck {
    client: Client,
}

impl HttpHealthCheck {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpHealthCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, base_url: &str) -> bool {
        let url = format!("{base_url}/health");
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }
}

/// Where a fetch goes and which dialect it speaks there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub kind: BackendKind,
    pub base_url: String,
}

/// Picks the data backend for each call.
///
/// Order: explicit endpoint, then (development only) a health check of the local
/// helper, then the remote service. Nothing is memoized.
pub struct BackendSelector {
    endpoint: Option<BackendTarget>,
    runtime: RuntimeMode,
    local_url: String,
    remote_url: String,
    health_timeout: Duration,
    health: Arc<dyn HealthCheck>,
}

impl BackendSelector {
    pub fn new(config: &FeedConfig, health: Arc<dyn HealthCheck>) -> Self {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| BackendTarget {
                kind: config.endpoint_kind,
                base_url: trim_base(url),
            });

        Self {
            endpoint,
            runtime: config.runtime,
            local_url: trim_base(&config.local_url),
            remote_url: trim_base(&config.remote_url),
            health_timeout: Duration::from_secs(config.health_timeout_seconds),
            health,
        }
    }

    pub async fn select(&self, cancel: &CancellationToken) -> BackendTarget {
        if let Some(target) = &self.endpoint {
            return target.clone();
        }

        let target = match self.runtime {
            RuntimeMode::Production => self.remote(),
            RuntimeMode::Development => {
                if self.local_is_healthy(cancel).await {
                    BackendTarget {
                        kind: BackendKind::Local,
                        base_url: self.local_url.clone(),
                    }
                } else {
                    self.remote()
                }
            }
        };
        info!(backend = %target.kind, url = %target.base_url, "Backend selected");
        target
    }

    fn remote(&self) -> BackendTarget {
        BackendTarget {
            kind: BackendKind::Remote,
            base_url: self.remote_url.clone(),
        }
    }

    async fn local_is_healthy(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Health check cancelled");
                false
            }
            result = tokio::time::timeout(self.health_timeout, self.health.check(&self.local_url)) => {
                match result {
                    Ok(healthy) => healthy,
                    Err(_) => {
                        debug!(timeout_secs = self.health_timeout.as_secs(), "Health check timed out");
                        false
                    }
                }
            }
        }
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockHealthCheck;

    fn dev_config() -> FeedConfig {
        FeedConfig {
            runtime: RuntimeMode::Development,
            local_url: "http://127.0.0.1:8765/".to_string(),
            remote_url: "https://remote.test".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn explicit_endpoint_wins_without_health_check() {
        let health = Arc::new(MockHealthCheck::healthy());
        let config = FeedConfig {
            endpoint: Some("http://10.0.0.5:9000/".to_string()),
            endpoint_kind: BackendKind::Local,
            ..dev_config()
        };
        let selector = BackendSelector::new(&config, health.clone());

        let target = selector.select(&CancellationToken::new()).await;
        assert_eq!(target.kind, BackendKind::Local);
        assert_eq!(target.base_url, "http://10.0.0.5:9000");
        assert_eq!(health.calls(), 0);
    }

    #[tokio::test]
    async fn development_routes_local_when_healthy() {
        let health = Arc::new(MockHealthCheck::healthy());
        let selector = BackendSelector::new(&dev_config(), health.clone());

        let target = selector.select(&CancellationToken::new()).await;
        assert_eq!(target.kind, BackendKind::Local);
        assert_eq!(target.base_url, "http://127.0.0.1:8765");
    }

    #[tokio::test]
    async fn development_falls_back_to_remote() {
        let selector = BackendSelector::new(&dev_config(), Arc::new(MockHealthCheck::unhealthy()));

        let target = selector.select(&CancellationToken::new()).await;
        assert_eq!(target.kind, BackendKind::Remote);
        assert_eq!(target.base_url, "https://remote.test");
    }

    #[tokio::test]
    async fn production_never_checks_health() {
        let health = Arc::new(MockHealthCheck::healthy());
        let config = FeedConfig {
            runtime: RuntimeMode::Production,
            ..dev_config()
        };
        let selector = BackendSelector::new(&config, health.clone());

        assert_eq!(
            selector.select(&CancellationToken::new()).await.kind,
            BackendKind::Remote
        );
        assert_eq!(health.calls(), 0);
    }

    #[tokio::test]
    async fn health_check_runs_on_every_selection() {
        let health = Arc::new(MockHealthCheck::healthy());
        let selector = BackendSelector::new(&dev_config(), health.clone());
        let cancel = CancellationToken::new();

        selector.select(&cancel).await;
        selector.select(&cancel).await;
        assert_eq!(health.calls(), 2);
    }

    #[tokio::test]
    async fn slow_health_check_times_out_to_remote() {
        let config = FeedConfig {
            health_timeout_seconds: 0,
            ..dev_config()
        };
        let health = Arc::new(MockHealthCheck::healthy().with_delay(Duration::from_millis(200)));
        let selector = BackendSelector::new(&config, health);

        assert_eq!(
            selector.select(&CancellationToken::new()).await.kind,
            BackendKind::Remote
        );
    }

    #[tokio::test]
    async fn cancelled_health_check_counts_as_failure() {
        let health = Arc::new(MockHealthCheck::healthy().with_delay(Duration::from_secs(30)));
        let selector = BackendSelector::new(&dev_config(), health);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(selector.select(&cancel).await.kind, BackendKind::Remote);
    }
}
