pub mod adapter;
pub mod error;
pub mod gemini;
mod http;
pub mod openai;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod provider;
pub mod retry;
pub mod test_support;

pub use adapter::ProviderAdapter;
pub use error::AgentError;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use orchestrator::ProviderOrchestrator;
pub use provider::{CompletionProvider, CompletionRequest};
pub use retry::RetryPolicy;
