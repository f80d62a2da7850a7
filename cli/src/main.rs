use clap::Parser;
use colored::*;
use grounded_cli::RelayClient;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod output;

use crate::cli::Args;
use crate::output::print_usage_instructions;

/// Main function - connects to the relay and asks questions
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let args = Args::parse();

    // Logs go to stderr so they never interleave with the streamed answer
    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = RelayClient::new(args.relay_url.clone());

    // Test connection to the relay
    if !client.test_connection().await? {
        eprintln!(
            "{}",
            format!(
                "Could not connect to the relay at {}. Please ensure relay-daemon is running.",
                client.base_url()
            )
            .red()
        );
        return Ok(()); // Exit gracefully if cannot connect
    }

    match (args.prompt, args.interactive) {
        (Some(prompt), _) if args.debug => app::run_debug_query(prompt, &client).await,
        (Some(prompt), false) => app::run_single_query(prompt, &client, args.verbose).await,
        (_, true) => app::run_interactive_chat(&client, args.verbose).await,
        (None, false) => {
            print_usage_instructions();
            Ok(())
        }
    }
}
