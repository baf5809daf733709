use sweep_models::ProviderKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("No AI provider configured: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{provider} request failed: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },

    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("Agent response parse error: {0}")]
    Parse(String),

    #[error("{0} returned an empty response")]
    EmptyResponse(ProviderKind),

    #[error("{provider} failed after {attempts} attempts")]
    ProviderExhausted {
        provider: ProviderKind,
        attempts: u32,
        #[source]
        last: Box<AgentError>,
    },
}

impl AgentError {
    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "No AI provider is configured. Set GEMINI_API_KEY or OPENAI_API_KEY.".to_string()
            }
            Self::InvalidRequest(reason) => format!("Invalid request: {reason}."),
            Self::Transport { provider, .. } => {
                format!("Could not reach {provider}. Check your connection and try again.")
            }
            Self::Http {
                provider, status, ..
            } => match status {
                401 | 403 => format!("{provider} rejected the API key."),
                429 => format!("{provider} is rate limiting requests. Try again shortly."),
                _ => format!("{provider} returned an error (HTTP {status})."),
            },
            Self::Parse(_) => "The AI response could not be understood. Try again.".to_string(),
            Self::EmptyResponse(provider) => format!("{provider} returned an empty response."),
            Self::ProviderExhausted { last, .. } => last.user_message(),
        }
    }
}
