//! `askdesk prompt`: print the persona instruction.
//!
//! Needs no credential; only the knowledge document and persona settings.

use askdesk_chat::persona_builder;
use askdesk_config::AppConfig;
use askdesk_core::KnowledgeDocument;
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let knowledge = KnowledgeDocument::load(&config.knowledge.path)?;
    let instruction = persona_builder(&config.persona).build(&knowledge);

    println!("{}", instruction.text());
    eprintln!();
    eprintln!(
        "  (~{} tokens, fallback contact {})",
        instruction.estimated_tokens(),
        instruction.fallback_contact()
    );
    Ok(())
}
