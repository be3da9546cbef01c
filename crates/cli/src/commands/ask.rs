//! `askdesk ask`: single question or interactive terminal chat.
//!
//! Runs the same startup checks as the gateway and keeps one session for the
//! whole REPL.

use askdesk_chat::Runtime;
use askdesk_config::AppConfig;
use askdesk_core::{Role, Turn};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = Runtime::bootstrap(config).await?;
    let session = runtime.sessions.create().await.id;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let turns = runtime.submit(&session, &msg).await;
        eprint!("\r              \r");
        for turn in turns?.iter().filter(|t| t.role == Role::Assistant) {
            println!("{}", turn.text);
        }
        return Ok(());
    }

    println!();
    println!("  askdesk, interactive mode");
    println!();
    println!("  Provider:  {}", runtime.orchestrator.provider_name());
    println!("  Model:     {}", runtime.orchestrator.model());
    println!("  History:   {}", runtime.orchestrator.history_policy());
    println!("  Contact:   {}", runtime.knowledge.fallback_contact());
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt_marker()?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }
        if text.is_empty() {
            prompt_marker()?;
            continue;
        }

        eprint!("  ...");
        let result = runtime.submit(&session, text).await;
        eprint!("\r     \r");

        match result {
            Ok(turns) => {
                println!();
                for turn in turns.iter().filter(|t| t.role == Role::Assistant) {
                    println!("{}", render_turn(turn));
                }
                println!();
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
        prompt_marker()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt_marker() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

/// Prefix every line of an assistant turn; advisories get their own marker.
fn render_turn(turn: &Turn) -> String {
    let prefix = if turn.is_advisory() {
        "  [!] "
    } else {
        "  Assistant > "
    };
    turn.text
        .lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
