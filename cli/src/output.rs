use colored::*;
use grounded_cli::{ChatSession, ExchangeObserver, ExchangeStatus, SessionUpdate, FAILURE_MESSAGE};
use grounded_core::Source;
use grounded_ipc::DebugResponse;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

/// Renders one exchange to the terminal as frames arrive
pub struct TerminalRenderer {
    spinner: Option<ProgressBar>,
    printed: usize,
    verbose: bool,
}

impl TerminalRenderer {
    pub fn new(verbose: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message("Searching...");
        spinner.enable_steady_tick(Duration::from_millis(120));

        Self {
            spinner: Some(spinner),
            printed: 0,
            verbose,
        }
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
            print!("{}: ", "Assistant".blue().bold());
        }
    }
}

impl ExchangeObserver for TerminalRenderer {
    fn on_update(&mut self, update: &SessionUpdate) {
        match update {
            SessionUpdate::Content(content) => {
                self.clear_spinner();
                // Content only ever grows while an exchange is streaming
                if let Some(delta) = content.get(self.printed..) {
                    print!("{}", delta);
                    let _ = io::stdout().flush();
                }
                self.printed = content.len();
            }
            SessionUpdate::Sources(_) => {}
            SessionUpdate::Interrupted(reason) => {
                if self.verbose {
                    eprintln!("\n{} {}", "Relay:".yellow(), reason);
                }
            }
        }
    }

    fn on_finished(&mut self, status: ExchangeStatus, session: &ChatSession) {
        self.clear_spinner();
        match status {
            ExchangeStatus::Completed => {
                println!();
                print_sources(session.sources());
            }
            ExchangeStatus::Cancelled => {
                println!("{}", " [stopped]".yellow());
            }
            ExchangeStatus::Failed => {
                if self.printed > 0 {
                    println!();
                }
                println!("{}", FAILURE_MESSAGE.red());
            }
        }
    }
}

/// Prints the numbered source list under an answer
pub fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("{}", "Sources:".cyan().bold());
    for (index, source) in sources.iter().enumerate() {
        println!(
            "  [{}] {} {}",
            index + 1,
            source.title.bold(),
            source.url.dimmed()
        );
    }
}

/// Prints the full response of the debug route
pub fn print_debug_response(response: &DebugResponse) {
    println!("{}: {}", "Assistant".blue().bold(), response.text);
    print_sources(&response.sources);

    if let Some(metadata) = &response.grounding_metadata {
        if let Some(queries) = &metadata.web_search_queries {
            println!();
            println!("{} {}", "Search queries:".cyan().bold(), queries.join(", "));
        }
        match serde_json::to_string_pretty(metadata) {
            Ok(json) => {
                println!();
                println!("{}", "Grounding metadata:".cyan().bold());
                println!("{}", json.dimmed());
            }
            Err(e) => eprintln!("{} {}", "Could not render metadata:".red(), e),
        }
    }
}

/// Show usage instructions when no prompt or action is provided
pub fn print_usage_instructions() {
    println!("{}", "Usage:".yellow().bold());
    println!("  {}", "grounded-chat \"your question\"".green().bold());
    println!("    Ask one question and stream the answer with its sources");
    println!();
    println!("  {}", "grounded-chat -i".green().bold());
    println!("    Start an interactive chat session");
    println!();
    println!("{}", "Options:".cyan());
    println!("  --relay-url <URL>  Relay daemon address (default http://127.0.0.1:8080)");
    println!("  --debug            Fetch the whole answer and raw grounding metadata at once");
    println!("  --help             Show this help message");
    println!();
}
