//! Options Sweep - option-chain ingestion and AI analysis core.
//!
//! Fetches option chains from a local helper or the hosted API, normalizes
//! every payload shape into labeled text datasets, and sends them to an AI
//! provider with retry and failover.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use sweep::models::config::SweepConfig;
//! use sweep::feed::{BackendClient, normalize};
//! use sweep::agents::ProviderOrchestrator;
//! use sweep::cache::ResponseCache;
//! ```

pub use sweep_agents as agents;
pub use sweep_cache as cache;
pub use sweep_feed as feed;
pub use sweep_models as models;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use sweep_agents::ProviderOrchestrator;
use sweep_cache::{KeyValueStore, MemoryStore, PreferenceStore, ResponseCache, SqliteStore};
use sweep_feed::{
    normalize, BackendClient, BackendSelector, FeedError, HttpHealthCheck, NormalizedData,
    ReqwestTransport, StaticDataClient, SymbolFailure,
};
use sweep_models::{
    AnalysisResult, CacheConfig, CacheNamespace, CanonicalResponse, ChatTurn, ProviderKind,
    StoreKind, SweepConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Normalized datasets for a set of symbols.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    #[serde(flatten)]
    pub data: NormalizedData,
    pub failed: Vec<SymbolFailure>,
    pub from_cache: bool,
}

/// Analysis output plus the symbols that could not be fetched for it.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub analysis: AnalysisResult,
    pub spot: Option<f64>,
    pub datasets: usize,
    pub failed: Vec<SymbolFailure>,
}

/// Everything the CLI needs, wired from one configuration.
pub struct SweepService {
    pub cache: Arc<ResponseCache>,
    pub preferences: PreferenceStore,
    pub backend: BackendClient,
    pub static_data: StaticDataClient,
    pub orchestrator: ProviderOrchestrator,
}

/// Build a service from configuration. A store that cannot be opened
/// disables caching and preferences instead of failing.
pub fn build_service(config: &SweepConfig, cancel: CancellationToken) -> SweepService {
    let ttl = Duration::from_secs(config.cache.ttl_seconds);
    let (cache, preferences) = match open_store(&config.cache) {
        Some(store) => (
            ResponseCache::new(store.clone(), ttl),
            PreferenceStore::new(store),
        ),
        None => (ResponseCache::unavailable(ttl), PreferenceStore::unavailable()),
    };
    let cache = Arc::new(cache);

    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
        config.feed.request_timeout_seconds,
    )));
    let selector = BackendSelector::new(&config.feed, Arc::new(HttpHealthCheck::new()));
    let backend = BackendClient::new(&config.feed, selector, transport.clone(), cache.clone())
        .with_cancel_token(cancel);
    let static_data = StaticDataClient::new(&config.feed, transport, cache.clone());
    let orchestrator = ProviderOrchestrator::from_config(&config.agents, preferences.clone());

    SweepService {
        cache,
        preferences,
        backend,
        static_data,
        orchestrator,
    }
}

fn open_store(config: &CacheConfig) -> Option<Arc<dyn KeyValueStore>> {
    match config.backend {
        StoreKind::Memory => Some(
            Arc::new(MemoryStore::new(config.memory_max_capacity)) as Arc<dyn KeyValueStore>
        ),
        StoreKind::Sqlite => match SqliteStore::open(&config.sqlite_path) {
            Ok(store) => Some(Arc::new(store) as Arc<dyn KeyValueStore>),
            Err(e) => {
                warn!(path = %config.sqlite_path, error = %e, "Cache store unavailable, continuing without cache");
                None
            }
        },
    }
}

impl SweepService {
    /// Fetch and merge the canonical envelope for `symbols`.
    pub async fn fetch(
        &self,
        symbols: &[String],
        force_refresh: bool,
    ) -> Result<(CanonicalResponse, Vec<SymbolFailure>), FeedError> {
        let bulk = self.backend.fetch_many(symbols, force_refresh).await?;
        Ok((bulk.response, bulk.failed))
    }

    pub async fn datasets(
        &self,
        symbols: &[String],
        force_refresh: bool,
    ) -> Result<DatasetReport, FeedError> {
        let bulk = self.backend.fetch_many(symbols, force_refresh).await?;
        Ok(DatasetReport {
            data: normalize(&bulk.response),
            failed: bulk.failed,
            from_cache: bulk.from_cache,
        })
    }

    pub async fn static_datasets(&self, force_refresh: bool) -> Result<DatasetReport, FeedError> {
        let fetched = self.static_data.fetch(force_refresh).await?;
        Ok(DatasetReport {
            data: normalize(&fetched.response),
            failed: Vec::new(),
            from_cache: fetched.from_cache,
        })
    }

    /// Fetch, normalize and analyze. Symbols that fail to fetch are skipped
    /// and reported.
    pub async fn analyze(
        &self,
        symbols: &[String],
        provider: Option<ProviderKind>,
        model: Option<&str>,
        force_refresh: bool,
    ) -> anyhow::Result<AnalysisReport> {
        let report = self
            .datasets(symbols, force_refresh)
            .await
            .context("Failed to fetch option data")?;
        let datasets = report.data.datasets.len();
        info!(symbols = symbols.len(), datasets, "Datasets ready for analysis");

        let analysis = self
            .orchestrator
            .get_analysis(report.data.datasets, report.data.spot, provider, model)
            .await
            .map_err(|e| {
                let message = format!("Analysis failed: {}", e.user_message());
                anyhow::Error::new(e).context(message)
            })?;

        Ok(AnalysisReport {
            analysis,
            spot: report.data.spot,
            datasets,
            failed: report.failed,
        })
    }

    pub async fn chat(
        &self,
        history: &[ChatTurn],
        provider: Option<ProviderKind>,
        model: Option<&str>,
    ) -> anyhow::Result<String> {
        self.orchestrator
            .get_chat(history, provider, model)
            .await
            .map_err(|e| {
                let message = format!("Chat failed: {}", e.user_message());
                anyhow::Error::new(e).context(message)
            })
    }

    pub async fn set_preferences(&self, provider: ProviderKind, model: Option<&str>) {
        self.preferences.set_provider(provider).await;
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            self.preferences.set_model(provider, model).await;
        }
    }

    /// Drop cached payloads. `symbol` limits the backend clear to one entry;
    /// with neither option both namespaces are cleared.
    pub async fn clear_cache(&self, symbol: Option<&str>, static_only: bool) -> anyhow::Result<()> {
        if static_only {
            self.cache.clear(CacheNamespace::Static, None).await;
            return Ok(());
        }
        match symbol {
            Some(raw) => {
                let symbol = self.backend.normalize_symbol(raw)?;
                self.cache.clear(CacheNamespace::Backend, Some(&symbol)).await;
            }
            None => {
                self.cache.clear(CacheNamespace::Backend, None).await;
                self.cache.clear(CacheNamespace::Static, None).await;
            }
        }
        Ok(())
    }
}
