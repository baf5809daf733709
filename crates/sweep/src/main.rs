use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use sweep::feed::{normalize, FeedError};
use sweep::models::{CanonicalResponse, ChatTurn, ProviderKind, SweepConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sweep", about = "Option-chain ingestion and AI analysis")]
struct Cli {
    /// Path to configuration file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = "config/sweep.toml")]
    config: String,

    /// Pretty-print the output JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and print the canonical envelope
    Fetch {
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Fetch and print normalized datasets with the spot price
    Datasets {
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Normalize a local envelope file
    Normalize {
        #[arg(short, long)]
        input: String,
    },
    /// Fetch and normalize the published static dataset
    Static {
        #[arg(long)]
        refresh: bool,
    },
    /// Fetch, normalize and analyze with an AI provider
    Analyze {
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(long)]
        provider: Option<ProviderKind>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Continue a conversation stored as a JSON array of turns
    Chat {
        #[arg(long)]
        history: String,
        #[arg(long)]
        provider: Option<ProviderKind>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Persist the preferred provider and model
    Prefer {
        #[arg(long)]
        provider: ProviderKind,
        #[arg(long)]
        model: Option<String>,
    },
    /// Drop cached payloads
    ClearCache {
        #[arg(long, conflicts_with = "static_only")]
        symbol: Option<String>,
        #[arg(long = "static")]
        static_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            ctrl_c.cancel();
        }
    });

    let service = sweep::build_service(&config, cancel);

    match cli.command {
        Command::Fetch { symbols, refresh } => {
            let (response, failed) = service
                .fetch(&symbols, refresh)
                .await
                .map_err(feed_error)?;
            print(&json!({"response": response, "failed": failed}), cli.pretty)
        }
        Command::Datasets { symbols, refresh } => {
            let report = service
                .datasets(&symbols, refresh)
                .await
                .map_err(feed_error)?;
            print(&report, cli.pretty)
        }
        Command::Normalize { input } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read input: {input}"))?;
            let response = CanonicalResponse::from_json_str(&text)
                .with_context(|| format!("Failed to parse envelope: {input}"))?;
            print(&normalize(&response), cli.pretty)
        }
        Command::Static { refresh } => {
            let report = service
                .static_datasets(refresh)
                .await
                .map_err(feed_error)?;
            print(&report, cli.pretty)
        }
        Command::Analyze {
            symbols,
            provider,
            model,
            refresh,
        } => {
            let report = service
                .analyze(&symbols, provider, model.as_deref(), refresh)
                .await?;
            print(&report, cli.pretty)
        }
        Command::Chat {
            history,
            provider,
            model,
        } => {
            let text = std::fs::read_to_string(&history)
                .with_context(|| format!("Failed to read history: {history}"))?;
            let turns: Vec<ChatTurn> =
                serde_json::from_str(&text).context("Failed to parse chat history JSON")?;
            let reply = service.chat(&turns, provider, model.as_deref()).await?;
            print(&json!({"role": "model", "text": reply}), cli.pretty)
        }
        Command::Prefer { provider, model } => {
            service.set_preferences(provider, model.as_deref()).await;
            print(&json!({"provider": provider, "model": model}), cli.pretty)
        }
        Command::ClearCache {
            symbol,
            static_only,
        } => {
            service.clear_cache(symbol.as_deref(), static_only).await?;
            print(&json!({"cleared": true}), cli.pretty)
        }
    }
}

fn load_config(path: &str) -> Result<SweepConfig> {
    if !Path::new(path).exists() {
        warn!(path, "Config file not found, using defaults");
        return Ok(SweepConfig::default());
    }
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| "Failed to parse config")
}

fn feed_error(e: FeedError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

fn print<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
