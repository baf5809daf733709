//! Facade wiring: fetch, normalize, analyze and cache maintenance through
//! `SweepService` with scripted backends and providers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sweep::agents::test_support::ScriptedProvider;
use sweep::agents::{ProviderAdapter, ProviderOrchestrator, RetryPolicy};
use sweep::cache::{MemoryStore, PreferenceStore, ResponseCache};
use sweep::feed::test_support::{MockHealthCheck, MockTransport};
use sweep::feed::{BackendClient, BackendSelector, StaticDataClient};
use sweep::models::{CacheNamespace, DatasetKind, FeedConfig, ProviderKind, StoreKind, SweepConfig};
use sweep::{build_service, SweepService};
use tokio_util::sync::CancellationToken;

const REMOTE: &str = "https://remote.test";
const STATIC: &str = "https://remote.test/data/options_data.json";

fn bulk(symbol: &str, spot: f64) -> serde_json::Value {
    json!({
        "version": "2.0",
        "generated": "2024-01-19T09:30:00",
        "metadata": {"timestamp": "2024-01-19T09:30:00", "source": "yfinance_api", "errors": null},
        "symbols": {
            symbol: {
                "spot": spot,
                "generated": "2024-01-19T09:30:00",
                "expiries": [{"label": "0DTE", "date": "2024-01-19", "options": [
                    {"strike": spot, "side": "CALL", "iv": 0.18, "oi": 10, "vol": 1},
                    {"strike": spot - 5.0, "side": "PUT", "iv": 0.21, "oi": 12, "vol": 2}
                ]}]
            }
        }
    })
}

fn bulk_route() -> String {
    format!("{REMOTE}/api/multiple")
}

fn service(
    transport: Arc<MockTransport>,
    providers: &[Arc<ScriptedProvider>],
) -> SweepService {
    let config = FeedConfig {
        remote_url: REMOTE.to_string(),
        static_url: STATIC.to_string(),
        ..Default::default()
    };
    let store = Arc::new(MemoryStore::new(100));
    let cache = Arc::new(ResponseCache::new(store.clone(), Duration::from_secs(300)));
    let preferences = PreferenceStore::new(store);

    let selector = BackendSelector::new(&config, Arc::new(MockHealthCheck::unhealthy()));
    let backend = BackendClient::new(&config, selector, transport.clone(), cache.clone());
    let static_data = StaticDataClient::new(&config, transport, cache.clone());
    let retry = RetryPolicy::new(3, Duration::from_millis(1));
    let adapters = providers
        .iter()
        .map(|p| ProviderAdapter::new(p.clone(), retry))
        .collect();

    SweepService {
        cache,
        preferences: preferences.clone(),
        backend,
        static_data,
        orchestrator: ProviderOrchestrator::new(adapters, preferences),
    }
}

#[tokio::test]
async fn datasets_for_remote_symbol() {
    let transport = Arc::new(
        MockTransport::new().with_json(&bulk_route(), bulk("SPY", 472.5)),
    );
    let svc = service(transport.clone(), &[]);

    let report = svc.datasets(&["spy".to_string()], false).await.unwrap();

    assert_eq!(report.data.spot, Some(472.5));
    assert_eq!(report.data.datasets.len(), 1);
    assert!(report.data.datasets[0].content.contains("CALL"));
    assert!(report.failed.is_empty());
    assert!(!report.from_cache);

    let again = svc.datasets(&["SPY".to_string()], false).await.unwrap();
    assert!(again.from_cache);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn analyze_sends_normalized_datasets() {
    let transport = Arc::new(
        MockTransport::new().with_json(&bulk_route(), bulk("QQQ", 410.0)),
    );
    let gemini = Arc::new(
        ScriptedProvider::new(ProviderKind::Gemini)
            .reply(r#"{"outlook": "range-bound", "levels": [{"price": 410.0, "kind": "call_wall"}]}"#),
    );
    let svc = service(transport, &[gemini.clone()]);

    let report = svc
        .analyze(&["QQQ".to_string()], None, None, false)
        .await
        .unwrap();

    assert_eq!(report.analysis.outlook, "range-bound");
    assert_eq!(report.spot, Some(410.0));
    assert_eq!(report.datasets, 1);
    let prompt = &gemini.requests()[0].turns[0].text;
    assert!(prompt.contains("SPOT PRICE: 410.00"));
    assert!(prompt.contains("QQQ"));
}

#[tokio::test]
async fn analyze_without_provider_keys_fails_cleanly() {
    let transport = Arc::new(
        MockTransport::new().with_json(&bulk_route(), bulk("SPY", 470.0)),
    );
    let gemini = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).without_credentials());
    let svc = service(transport, &[gemini]);

    let err = svc
        .analyze(&["SPY".to_string()], None, None, false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No AI provider is configured"));
}

#[tokio::test]
async fn static_datasets_are_cached() {
    let envelope = json!({
        "version": "2.0",
        "generated": "2024-01-19T09:00:00",
        "structured": {"spot_price": 470.25, "call_levels": [], "put_levels": [], "gamma_levels": []}
    });
    let transport = Arc::new(MockTransport::new().with_json(STATIC, envelope));
    let svc = service(transport.clone(), &[]);

    let first = svc.static_datasets(false).await.unwrap();
    assert_eq!(first.data.spot, Some(470.25));
    assert!(svc.static_datasets(false).await.unwrap().from_cache);

    svc.clear_cache(None, true).await.unwrap();
    assert!(!svc.static_datasets(false).await.unwrap().from_cache);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn clear_cache_by_symbol() {
    let transport = Arc::new(
        MockTransport::new().with_json(&bulk_route(), bulk("SPY", 470.0)),
    );
    let svc = service(transport, &[]);
    svc.datasets(&["SPY".to_string()], false).await.unwrap();
    assert!(svc.cache.get(CacheNamespace::Backend, Some("SPY")).await.is_some());

    svc.clear_cache(Some(" spy "), false).await.unwrap();
    assert!(svc.cache.get(CacheNamespace::Backend, Some("SPY")).await.is_none());
    assert!(svc.clear_cache(Some("TSLA"), false).await.is_err());
}

#[tokio::test]
async fn preferences_steer_chat() {
    let gemini = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).reply("from gemini"));
    let openai = Arc::new(ScriptedProvider::new(ProviderKind::OpenAi).reply("from openai"));
    let svc = service(Arc::new(MockTransport::new()), &[gemini.clone(), openai.clone()]);

    svc.set_preferences(ProviderKind::OpenAi, Some("gpt-4o")).await;
    let reply = svc
        .chat(&[sweep::models::ChatTurn::user("hi")], None, None)
        .await
        .unwrap();

    assert_eq!(reply, "from openai");
    assert_eq!(openai.requests()[0].model, "gpt-4o");
    assert_eq!(gemini.attempts(), 0);
}

#[test]
fn unopenable_store_disables_cache() {
    let mut config = SweepConfig::default();
    config.cache.sqlite_path = "/dev/null/sweep/cache.db".to_string();
    let svc = build_service(&config, CancellationToken::new());
    assert!(!svc.cache.is_available());

    config.cache.backend = StoreKind::Memory;
    let svc = build_service(&config, CancellationToken::new());
    assert!(svc.cache.is_available());
    assert_eq!(svc.orchestrator.adapters().len(), 2);
}

#[test]
fn dataset_kinds_serialize_upper_snake() {
    assert_eq!(
        serde_json::to_value(DatasetKind::ZeroDte).unwrap(),
        json!("ZERO_DTE")
    );
}
