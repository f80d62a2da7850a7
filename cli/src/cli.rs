use clap::Parser;

/// Terminal client for the grounded chat relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The question to ask
    #[arg(index = 1)] // Positional argument
    pub prompt: Option<String>,

    /// Enter interactive chat mode
    #[arg(short, long, default_value_t = false)]
    pub interactive: bool,

    /// Address of the relay daemon
    #[arg(long, env = "GROUNDED_RELAY_URL", default_value = "http://127.0.0.1:8080")]
    pub relay_url: String,

    /// Use the relay's non-streaming debug route and print raw grounding metadata
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
