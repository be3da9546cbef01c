//! askdesk CLI, the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP gateway and chat page
//! - `ask`     Ask a single question or chat in the terminal
//! - `prompt`  Print the persona instruction built from the knowledge document
//! - `doctor`  Diagnose configuration, credential, and knowledge document

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "askdesk",
    about = "askdesk: a help desk chatbot grounded in one knowledge document",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to askdesk.toml (defaults to $ASKDESK_CONFIG, then ./askdesk.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway and chat page
    Serve {
        /// Override the bind address
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question from the terminal
    Ask {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the persona instruction sent to the model
    Prompt,

    /// Diagnose configuration and knowledge document
    Doctor {
        /// Skip the network credential probe
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(config_path, host, port).await?,
        Commands::Ask { message } => commands::ask::run(config_path, message).await?,
        Commands::Prompt => commands::prompt::run(config_path)?,
        Commands::Doctor { offline } => commands::doctor::run(config_path, offline).await?,
    }

    Ok(())
}
