use anyhow::{Context, Result};
use colored::*;
use grounded_cli::{ChatSession, ExchangeStatus, RelayClient};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::output::{print_debug_response, TerminalRenderer};

/// Cancels `cancel` when the user presses Ctrl-C
fn cancel_on_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    })
}

/// Streams one exchange to the terminal; Ctrl-C stops it and keeps what was shown
async fn run_exchange(
    client: &RelayClient,
    session: &mut ChatSession,
    input: &str,
    verbose: bool,
) -> Result<ExchangeStatus> {
    let cancel = CancellationToken::new();
    let interrupt = cancel_on_interrupt(cancel.clone());

    let mut renderer = TerminalRenderer::new(verbose);
    let result = client.send_chat(session, input, &cancel, &mut renderer).await;

    interrupt.abort();
    result
}

/// Runs a single query, streaming the answer and its sources
pub async fn run_single_query(prompt: String, client: &RelayClient, verbose: bool) -> Result<()> {
    info!("Running single query: {}", prompt);

    let mut session = ChatSession::new();
    match run_exchange(client, &mut session, &prompt, verbose).await? {
        ExchangeStatus::Failed => Err(anyhow::anyhow!("The relay could not answer the question")),
        _ => Ok(()),
    }
}

/// Runs a single query through the debug route and prints everything it returns
pub async fn run_debug_query(prompt: String, client: &RelayClient) -> Result<()> {
    info!("Running debug query: {}", prompt);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Waiting for the full answer...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = client.debug(&prompt).await;
    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            print_debug_response(&response);
            Ok(())
        }
        Err(e) => {
            error!("Debug query failed: {:#}", e);
            Err(e)
        }
    }
}

/// Runs an interactive chat session; the conversation is kept across turns
pub async fn run_interactive_chat(client: &RelayClient, verbose: bool) -> Result<()> {
    println!("Starting interactive chat session with {}.", client.base_url());
    println!("Type 'exit' or 'quit' to end the session, Ctrl-C stops an answer.");
    println!();

    let mut session = ChatSession::new();

    loop {
        // Prompt for user input
        print!("{}: ", "You".green().bold());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        let read = io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;
        if read == 0 {
            println!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Check for exit command
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Exiting chat session.");
            break;
        }

        debug!("Sending turn {}", session.messages().len() / 2 + 1);
        let status = run_exchange(client, &mut session, input, verbose).await?;
        debug!(?status, "Exchange finished");

        println!(); // Add spacing between interactions
    }

    Ok(())
}
