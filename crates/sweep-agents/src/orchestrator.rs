use std::future::Future;
use std::time::Duration;

use sweep_cache::PreferenceStore;
use sweep_models::{
    AgentsConfig, AnalysisRequest, AnalysisResult, ChatTurn, MarketDataset, ProviderKind,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapter::ProviderAdapter;
use crate::error::AgentError;
use crate::provider;
use crate::retry::RetryPolicy;

/// Progress of one orchestrated call.
enum CallState<T> {
    SelectProvider,
    AttemptPrimary { primary: usize },
    AttemptFallback { primary: usize, error: AgentError },
    Done(T),
    Failed(AgentError),
}

/// Routes analysis and chat calls to a provider, falling back once to an
/// alternate provider when the first one fails.
pub struct ProviderOrchestrator {
    adapters: Vec<ProviderAdapter>,
    preferences: PreferenceStore,
}

impl ProviderOrchestrator {
    /// Adapters are kept in the given order, which is also fallback order.
    pub fn new(adapters: Vec<ProviderAdapter>, preferences: PreferenceStore) -> Self {
        Self {
            adapters,
            preferences,
        }
    }

    pub fn from_config(config: &AgentsConfig, preferences: PreferenceStore) -> Self {
        let retry = RetryPolicy::from_config(config);
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        let adapters = config
            .providers
            .iter()
            .map(|p| ProviderAdapter::new(provider::from_config(p, timeout), retry))
            .collect();
        Self::new(adapters, preferences)
    }

    pub fn adapters(&self) -> &[ProviderAdapter] {
        &self.adapters
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub async fn get_analysis(
        &self,
        datasets: Vec<MarketDataset>,
        spot_price: Option<f64>,
        provider: Option<ProviderKind>,
        model: Option<&str>,
    ) -> Result<AnalysisResult, AgentError> {
        if datasets.is_empty() {
            return Err(AgentError::InvalidRequest("no datasets to analyze".to_string()));
        }
        let request = AnalysisRequest::new(datasets, spot_price);
        let request = &request;
        info!(
            request_id = %request.request_id,
            datasets = request.datasets.len(),
            "Starting analysis"
        );

        self.run("analysis", request.request_id, provider, model, |index, model| async move {
            self.adapters[index].get_analysis(request, &model).await
        })
        .await
    }

    pub async fn get_chat(
        &self,
        history: &[ChatTurn],
        provider: Option<ProviderKind>,
        model: Option<&str>,
    ) -> Result<String, AgentError> {
        if history.is_empty() {
            return Err(AgentError::InvalidRequest("chat history is empty".to_string()));
        }
        let request_id = Uuid::new_v4();

        self.run("chat", request_id, provider, model, |index, model| async move {
            self.adapters[index].continue_chat(history, &model).await
        })
        .await
    }

    /// Provider for a call: the requested one, else the stored preference,
    /// else the first with credentials. A chosen provider without
    /// credentials is swapped for the first one that has them.
    pub async fn select_provider(
        &self,
        requested: Option<ProviderKind>,
    ) -> Result<usize, AgentError> {
        let wanted = match requested {
            Some(kind) => Some(kind),
            None => self.preferences.provider().await,
        };
        let first_usable = || self.adapters.iter().position(|a| a.has_credentials());

        let chosen = match wanted.and_then(|kind| self.index_of(kind)) {
            Some(index) if self.adapters[index].has_credentials() => Some(index),
            Some(index) => {
                let substitute = first_usable();
                if let Some(sub) = substitute {
                    warn!(
                        wanted = %self.adapters[index].kind(),
                        using = %self.adapters[sub].kind(),
                        "Provider has no API key, substituting"
                    );
                }
                substitute
            }
            None => first_usable(),
        };

        chosen.ok_or_else(|| {
            AgentError::Configuration("no provider has an API key".to_string())
        })
    }

    /// Model for a provider: the caller's, else the stored preference, else
    /// the provider default.
    pub async fn select_model(&self, index: usize, requested: Option<&str>) -> String {
        let adapter = &self.adapters[index];
        if let Some(model) = requested.map(str::trim).filter(|m| !m.is_empty()) {
            return model.to_string();
        }
        match self.preferences.model(adapter.kind()).await {
            Some(model) => model,
            None => adapter.default_model().to_string(),
        }
    }

    fn index_of(&self, kind: ProviderKind) -> Option<usize> {
        self.adapters.iter().position(|a| a.kind() == kind)
    }

    fn fallback_for(&self, primary: usize) -> Option<usize> {
        let primary_kind = self.adapters[primary].kind();
        self.adapters
            .iter()
            .position(|a| a.kind() != primary_kind && a.has_credentials())
    }

    async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        request_id: Uuid,
        provider: Option<ProviderKind>,
        model: Option<&str>,
        call: F,
    ) -> Result<T, AgentError>
    where
        F: Fn(usize, String) -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let mut state = CallState::SelectProvider;
        loop {
            state = match state {
                CallState::SelectProvider => match self.select_provider(provider).await {
                    Ok(primary) => CallState::AttemptPrimary { primary },
                    Err(e) => CallState::Failed(e),
                },
                CallState::AttemptPrimary { primary } => {
                    let chosen_model = self.select_model(primary, model).await;
                    let kind = self.adapters[primary].kind();
                    info!(%request_id, operation, provider = %kind, model = %chosen_model, "Calling provider");
                    match call(primary, chosen_model).await {
                        Ok(value) => CallState::Done(value),
                        Err(error) => {
                            warn!(%request_id, operation, provider = %kind, error = %error, "Provider failed");
                            CallState::AttemptFallback { primary, error }
                        }
                    }
                }
                CallState::AttemptFallback { primary, error } => match self.fallback_for(primary) {
                    None => CallState::Failed(error),
                    Some(fallback) => {
                        let fallback_model = self.select_model(fallback, None).await;
                        let kind = self.adapters[fallback].kind();
                        info!(%request_id, operation, provider = %kind, model = %fallback_model, "Trying fallback provider");
                        match call(fallback, fallback_model).await {
                            Ok(value) => CallState::Done(value),
                            Err(fallback_error) => {
                                warn!(
                                    %request_id,
                                    operation,
                                    provider = %kind,
                                    error = %fallback_error,
                                    "Fallback provider failed"
                                );
                                CallState::Failed(error)
                            }
                        }
                    }
                },
                CallState::Done(value) => {
                    info!(%request_id, operation, "Call complete");
                    return Ok(value);
                }
                CallState::Failed(error) => return Err(error),
            };
        }
    }
}
