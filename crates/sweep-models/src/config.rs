use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SweepConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

/// Which key-value store backs the response cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: StoreKind,
    /// Path to the SQLite file when `backend = "sqlite"`.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    /// Maximum age of a cached payload.
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Capacity of the moka store when `backend = "memory"`.
    #[serde(default = "default_memory_capacity")]
    pub memory_max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::default(),
            sqlite_path: default_sqlite_path(),
            ttl_seconds: default_cache_ttl(),
            memory_max_capacity: default_memory_capacity(),
        }
    }
}

/// The dialect a data backend speaks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    #[default]
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Whether the process runs next to a local data helper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Development,
    #[default]
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    /// Explicit backend URL. When set, no health check runs.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Dialect of the explicit endpoint.
    #[serde(default)]
    pub endpoint_kind: BackendKind,
    #[serde(default)]
    pub runtime: RuntimeMode,
    #[serde(default = "default_local_url")]
    pub local_url: String,
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    /// Published envelope written by the scheduled data job.
    #[serde(default = "default_static_url")]
    pub static_url: String,
    #[serde(default = "default_health_timeout")]
    pub health_timeout_seconds: u64,
    #[serde(default = "default_feed_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Allow-list of symbols. Empty allows any symbol.
    #[serde(default = "default_supported_symbols")]
    pub supported_symbols: Vec<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            endpoint_kind: BackendKind::default(),
            runtime: RuntimeMode::default(),
            local_url: default_local_url(),
            remote_url: default_remote_url(),
            static_url: default_static_url(),
            health_timeout_seconds: default_health_timeout(),
            request_timeout_seconds: default_feed_request_timeout(),
            supported_symbols: default_supported_symbols(),
        }
    }
}

/// AI completion provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentsConfig {
    /// Attempts per analysis call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_agent_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Providers in fallback order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_seconds: default_agent_request_timeout(),
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Inline key. Takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Override for the provider's API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        let env = match kind {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        };
        Self {
            kind,
            api_key: None,
            api_key_env: Some(env.to_string()),
            base_url: None,
            default_model: None,
        }
    }

    /// Resolve the credential: inline key first, then the environment.
    /// Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|name| std::env::var(name).ok())
            })
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_sqlite_path() -> String {
    "data/sweep_cache.db".to_string()
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_memory_capacity() -> u64 {
    1_000
}
fn default_local_url() -> String {
    "http://127.0.0.1:8765".to_string()
}
fn default_remote_url() -> String {
    "https://options-sweep.example.com".to_string()
}
fn default_static_url() -> String {
    "https://options-sweep.example.com/data/options_data.json".to_string()
}
fn default_health_timeout() -> u64 {
    3
}
fn default_feed_request_timeout() -> u64 {
    60
}
fn default_supported_symbols() -> Vec<String> {
    ["SPY", "QQQ", "SPX", "NDX"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_agent_request_timeout() -> u64 {
    90
}
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(ProviderKind::Gemini),
        ProviderConfig::new(ProviderKind::OpenAi),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: SweepConfig = toml::from_str("").unwrap();
        assert_eq!(config, SweepConfig::default());
        assert_eq!(config.cache.ttl_seconds, 300);
        assert_eq!(config.feed.health_timeout_seconds, 3);
        assert_eq!(config.agents.max_attempts, 3);
        assert_eq!(config.agents.retry_delay_ms, 1_000);
        assert_eq!(config.agents.providers.len(), 2);
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[cache]
backend = "memory"
ttl_seconds = 60

[feed]
endpoint = "http://10.0.0.5:9000"
endpoint_kind = "local"
runtime = "development"
supported_symbols = []

[agents]
max_attempts = 2

[[agents.providers]]
kind = "openai"
api_key = "sk-test"
default_model = "gpt-4o-mini"

[[agents.providers]]
kind = "gemini"
base_url = "http://localhost:1234"
"#;
        let config: SweepConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cache.backend, StoreKind::Memory);
        assert_eq!(config.cache.sqlite_path, "data/sweep_cache.db");
        assert_eq!(config.feed.endpoint.as_deref(), Some("http://10.0.0.5:9000"));
        assert_eq!(config.feed.endpoint_kind, BackendKind::Local);
        assert_eq!(config.feed.runtime, RuntimeMode::Development);
        assert!(config.feed.supported_symbols.is_empty());
        assert_eq!(config.agents.providers[0].kind, ProviderKind::OpenAi);
        assert_eq!(
            config.agents.providers[0].resolve_api_key().as_deref(),
            Some("sk-test")
        );
        assert_eq!(config.agents.providers[1].api_key_env, None);
    }

    #[test]
    fn blank_key_is_no_key() {
        let mut provider = ProviderConfig::new(ProviderKind::Gemini);
        provider.api_key = Some("   ".to_string());
        provider.api_key_env = None;
        assert_eq!(provider.resolve_api_key(), None);
    }

    #[test]
    fn provider_kind_parse() {
        assert_eq!("Gemini".parse::<ProviderKind>(), Ok(ProviderKind::Gemini));
        assert_eq!("openai".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert!("claude".parse::<ProviderKind>().is_err());
        assert_eq!(
            serde_json::to_string(&ProviderKind::OpenAi).unwrap(),
            "\"openai\""
        );
    }

    #[test]
    fn roundtrip_config() {
        let config = SweepConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: SweepConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
