use sweep_models::EnvelopeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("backend unreachable at {url}: {reason}")]
    NetworkUnavailable { url: String, reason: String },

    #[error("invalid backend endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("unrecognized upstream payload: {0}")]
    UpstreamFormat(#[from] EnvelopeError),

    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("backend returned no data for {symbol} (reported failed: {reported})")]
    SymbolUnavailable { symbol: String, reported: bool },

    #[error("no symbols requested")]
    NoSymbols,

    #[error("all {} symbol fetches failed: {}", .failures.len(), summarize(.failures))]
    AllSymbolsFailed { failures: Vec<(String, FeedError)> },
}

fn summarize(failures: &[(String, FeedError)]) -> String {
    failures
        .iter()
        .map(|(symbol, e)| format!("{symbol}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl FeedError {
    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnavailable { .. } => {
                "Data backend is unreachable. Check that the local server is running or try again later."
                    .to_string()
            }
            Self::InvalidEndpoint { .. } => "The configured data backend URL is invalid.".to_string(),
            Self::Http { status, message } if message.trim().is_empty() => {
                format!("Data backend returned an error (HTTP {status}).")
            }
            Self::Http { message, .. } => message.clone(),
            Self::MalformedResponse { .. } | Self::UpstreamFormat(_) => {
                "Data backend returned data in an unexpected format.".to_string()
            }
            Self::UnsupportedSymbol(symbol) => format!("Symbol {symbol} is not supported."),
            Self::SymbolUnavailable { symbol, .. } => format!("No data is available for {symbol} right now."),
            Self::NoSymbols => "No symbols requested.".to_string(),
            Self::AllSymbolsFailed { failures } => match failures.first() {
                Some((_, first)) if failures.len() == 1 => first.user_message(),
                _ => "Could not fetch data for any requested symbol.".to_string(),
            },
        }
    }

    /// True when the backend could not be reached at all.
    pub fn is_network(&self) -> bool {
        match self {
            Self::NetworkUnavailable { .. } => true,
            Self::AllSymbolsFailed { failures } => {
                !failures.is_empty() && failures.iter().all(|(_, e)| e.is_network())
            }
            _ => false,
        }
    }
}
