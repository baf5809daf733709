use std::sync::Arc;

use sweep_cache::ResponseCache;
use sweep_models::{CacheNamespace, CanonicalResponse, FeedConfig};
use tracing::{info, warn};

use crate::client::FetchSuccess;
use crate::error::FeedError;
use crate::transport::JsonTransport;

/// Reads the published envelope file produced by the scheduled data job.
/// Cached as the single entry of the `static` namespace.
pub struct StaticDataClient {
    url: String,
    transport: Arc<dyn JsonTransport>,
    cache: Arc<ResponseCache>,
}

impl StaticDataClient {
    pub fn new(config: &FeedConfig, transport: Arc<dyn JsonTransport>, cache: Arc<ResponseCache>) -> Self {
        Self {
            url: config.static_url.trim().to_string(),
            transport,
            cache,
        }
    }

    pub async fn fetch(&self, force_refresh: bool) -> Result<FetchSuccess, FeedError> {
        if !force_refresh {
            if let Some(response) = self
                .cache
                .get_as::<CanonicalResponse>(CacheNamespace::Static, None)
                .await
            {
                info!(from_cache = true, "Static dataset served from cache");
                return Ok(FetchSuccess {
                    response,
                    from_cache: true,
                    backend: None,
                });
            }
        }

        let value = self
            .transport
            .get_json(&self.url, &[])
            .await
            .inspect_err(|e| warn!(url = %self.url, error = %e, "Static dataset fetch failed"))?;
        let response = CanonicalResponse::try_from(value)?;

        self.cache.put(CacheNamespace::Static, None, &response).await;
        info!(
            version = response.version.as_deref().unwrap_or_default(),
            generated = response.generated_at.as_deref().unwrap_or_default(),
            "Static dataset fetched"
        );
        Ok(FetchSuccess {
            response,
            from_cache: false,
            backend: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockReply, MockTransport};
    use serde_json::json;
    use std::time::Duration;
    use sweep_cache::MemoryStore;

    const URL: &str = "https://static.test/data/options_data.json";

    fn client(transport: Arc<MockTransport>) -> StaticDataClient {
        let config = FeedConfig {
            static_url: URL.to_string(),
            ..Default::default()
        };
        let cache = Arc::new(ResponseCache::new(
            Arc::new(MemoryStore::new(10)),
            Duration::from_secs(300),
        ));
        StaticDataClient::new(&config, transport, cache)
    }

    fn published() -> serde_json::Value {
        json!({
            "version": "14.0",
            "generated": "2024-01-19T09:30:00",
            "symbols": {"SPY": {"spot": 475.0, "expiries": [], "legacy": {
                "0DTE (2024-01-19)": {"content": "rows", "type": "0DTE", "date": "2024-01-19"}
            }}}
        })
    }

    #[tokio::test]
    async fn fetch_then_cache() {
        let transport = Arc::new(MockTransport::new().with_json(URL, published()));
        let client = client(transport.clone());

        let first = client.fetch(false).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.response.version.as_deref(), Some("14.0"));

        let second = client.fetch(false).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.response, first.response);
        assert_eq!(transport.call_count(), 1);

        client.fetch(true).await.unwrap();
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_shape_is_upstream_format_error() {
        let transport = Arc::new(MockTransport::new().with_json(URL, json!({"version": "1"})));
        let err = client(transport).fetch(false).await.unwrap_err();
        assert!(matches!(err, FeedError::UpstreamFormat(_)));
    }

    #[tokio::test]
    async fn missing_file_is_http_error() {
        let transport = Arc::new(MockTransport::new().with_reply(
            URL,
            MockReply::Http {
                status: 404,
                message: "Not Found".to_string(),
            },
        ));
        let err = client(transport).fetch(false).await.unwrap_err();
        assert!(matches!(err, FeedError::Http { status: 404, .. }));
    }
}
