use std::sync::Arc;

use sweep_models::{AnalysisRequest, AnalysisResult, ChatTurn, ProviderKind};
use tracing::debug;

use crate::error::AgentError;
use crate::parser::parse_analysis;
use crate::prompts::{
    analysis_schema, build_analysis_prompt, ANALYSIS_SYSTEM_PROMPT, CHAT_FALLBACK,
    CHAT_SYSTEM_PROMPT,
};
use crate::provider::{CompletionProvider, CompletionRequest};
use crate::retry::RetryPolicy;

/// Turns analysis and chat calls into provider completions.
pub struct ProviderAdapter {
    provider: Arc<dyn CompletionProvider>,
    retry: RetryPolicy,
}

impl ProviderAdapter {
    pub fn new(provider: Arc<dyn CompletionProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn has_credentials(&self) -> bool {
        self.provider.has_credentials()
    }

    pub fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    /// Structured analysis. Transport, HTTP and parse failures are retried
    /// under the adapter's policy.
    pub async fn get_analysis(
        &self,
        request: &AnalysisRequest,
        model: &str,
    ) -> Result<AnalysisResult, AgentError> {
        let completion = CompletionRequest {
            model: model.to_string(),
            system: ANALYSIS_SYSTEM_PROMPT.to_string(),
            turns: vec![ChatTurn::user(build_analysis_prompt(request))],
            response_schema: self
                .provider
                .supports_response_schema()
                .then(analysis_schema),
            json_mode: true,
        };
        let completion = &completion;

        self.retry
            .run(self.kind(), |attempt| async move {
                debug!(
                    request_id = %request.request_id,
                    provider = %self.kind(),
                    model = %completion.model,
                    attempt,
                    "Requesting analysis"
                );
                let text = self.provider.complete(completion).await?;
                parse_analysis(&text)
            })
            .await
    }

    /// One chat turn, not retried. An empty reply becomes the fixed fallback.
    pub async fn continue_chat(
        &self,
        history: &[ChatTurn],
        model: &str,
    ) -> Result<String, AgentError> {
        let completion = CompletionRequest {
            model: model.to_string(),
            system: CHAT_SYSTEM_PROMPT.to_string(),
            turns: history.to_vec(),
            response_schema: None,
            json_mode: false,
        };

        match self.provider.complete(&completion).await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) | Err(AgentError::EmptyResponse(_)) => Ok(CHAT_FALLBACK.to_string()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;
    use std::time::Duration;
    use sweep_models::{DatasetKind, MarketDataset};

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            vec![MarketDataset::new("SPY-0", "SPY 0DTE", "rows", DatasetKind::ZeroDte)],
            Some(470.0),
        )
    }

    fn adapter(provider: Arc<ScriptedProvider>) -> ProviderAdapter {
        ProviderAdapter::new(provider, RetryPolicy::new(3, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn analysis_retries_parse_failures() {
        let provider = Arc::new(
            ScriptedProvider::new(ProviderKind::Gemini)
                .reply("not json at all")
                .reply("```json\n{\"outlook\": \"bullish\", \"levels\": []}\n```"),
        );
        let result = adapter(provider.clone())
            .get_analysis(&request(), "gemini-2.0-flash")
            .await
            .unwrap();

        assert_eq!(result.outlook, "bullish");
        assert_eq!(provider.attempts(), 2);
        let sent = provider.requests();
        assert_eq!(sent[0].model, "gemini-2.0-flash");
        assert!(sent[0].json_mode);
        assert!(sent[0].response_schema.is_some());
    }

    #[tokio::test]
    async fn schema_only_for_supporting_providers() {
        let provider = Arc::new(
            ScriptedProvider::new(ProviderKind::OpenAi)
                .without_schema()
                .reply("{\"outlook\": \"flat\"}"),
        );
        adapter(provider.clone())
            .get_analysis(&request(), "gpt-4o-mini")
            .await
            .unwrap();
        assert!(provider.requests()[0].response_schema.is_none());
    }

    #[tokio::test]
    async fn chat_trims_and_falls_back() {
        let provider = Arc::new(
            ScriptedProvider::new(ProviderKind::Gemini)
                .reply("  Support sits at 470.  \n")
                .fail(AgentError::EmptyResponse(ProviderKind::Gemini)),
        );
        let adapter = adapter(provider.clone());
        let history = vec![ChatTurn::user("Where is support?")];

        let first = adapter.continue_chat(&history, "m").await.unwrap();
        assert_eq!(first, "Support sits at 470.");

        let second = adapter.continue_chat(&history, "m").await.unwrap();
        assert_eq!(second, CHAT_FALLBACK);

        let sent = provider.requests();
        assert!(!sent[0].json_mode);
        assert_eq!(sent[0].system, CHAT_SYSTEM_PROMPT);
        assert_eq!(sent[0].turns, history);
    }

    #[tokio::test]
    async fn chat_errors_are_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini).fail_times(2));
        let result = adapter(provider.clone())
            .continue_chat(&[ChatTurn::user("hi")], "m")
            .await;
        assert!(matches!(result, Err(AgentError::Transport { .. })));
        assert_eq!(provider.attempts(), 1);
    }
}
