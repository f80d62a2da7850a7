use clap::Parser;
use grounded_core::{GeminiClient, GeminiConfig};
use grounded_relay::config::{default_config_path, RelayConfig};
use grounded_relay::http_server::{self, AppState};
use grounded_relay::relay::StreamRelay;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-daemon", about = "Streams search-grounded Gemini answers to chat clients")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// System prompt to use instead of the dated default
    #[arg(short, long)]
    system_prompt: Option<String>,

    /// Gemini API key
    #[arg(short = 'k', long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model to use
    #[arg(short = 'o', long)]
    model: Option<String>,

    /// HTTP server address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Disable search grounding
    #[arg(long)]
    no_grounding: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting relay daemon");

    // Parse command line args
    let args = Args::parse();

    // Load config from file or use defaults
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = match RelayConfig::load_from_file(&config_path) {
        Ok(cfg) => {
            info!("Loaded configuration from {}", config_path.display());
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration from {}: {:#}", config_path.display(), e);
            return Err(e);
        }
    };

    // Environment, then CLI args, override the file
    let overrides = GeminiConfig {
        api_key: args.api_key,
        model_name: args.model,
        system_prompt: args.system_prompt,
        search_grounding: args.no_grounding.then_some(false),
        ..GeminiConfig::empty()
    };
    config.gemini = config.gemini.merge(&GeminiConfig::from_env()).merge(&overrides);
    if let Some(addr) = args.http_addr {
        config.http_addr = addr;
    }

    // Initialize Gemini client
    let gemini_client = match GeminiClient::new(&config.gemini) {
        Ok(client) => {
            info!("Initialized Gemini client");
            client
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Gemini client");
            return Err(anyhow::anyhow!("Failed to initialize Gemini client: {}", e));
        }
    };

    let relay = StreamRelay::new(
        Arc::new(gemini_client),
        config.gemini.clone(),
        config.frame_buffer,
    );
    let state = AppState::new(relay);

    http_server::run_server(state, config.http_addr, shutdown_signal()).await?;

    info!("Relay daemon shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
