//! `askdesk doctor`: diagnose configuration, credential, and knowledge document.

use askdesk_config::AppConfig;
use askdesk_core::{CompletionError, KnowledgeDocument};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    offline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("askdesk doctor");
    println!("==============\n");

    let mut issues = 0;

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            return Err("configuration could not be loaded".into());
        }
    };
    println!("     provider {}, model {}", config.provider, config.model);

    let has_key = match config.require_api_key() {
        Ok(_) if !config.provider_requires_key() => {
            println!("  ✅ No API key needed for {}", config.provider);
            true
        }
        Ok(_) => {
            println!("  ✅ API key configured");
            true
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
            false
        }
    };

    match KnowledgeDocument::load(&config.knowledge.path) {
        Ok(doc) => {
            println!(
                "  ✅ Knowledge document loaded: {}",
                config.knowledge.path.display()
            );
            println!("  ✅ Fallback contact: {}", doc.fallback_contact());
        }
        Err(e) => {
            println!("  ❌ Knowledge document: {e}");
            issues += 1;
        }
    }

    if offline {
        println!("  ⏭  Credential probe skipped (--offline)");
    } else if has_key {
        match probe(&config).await {
            Ok(true) => println!("  ✅ Provider accepted the credential"),
            Ok(false) => println!("  ⚠️  Provider probe inconclusive"),
            Err(e @ CompletionError::Unauthorized(_)) => {
                println!("  ❌ {e}");
                issues += 1;
            }
            Err(e) => println!("  ⚠️  Provider unreachable: {e}"),
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
        Ok(())
    } else {
        println!("  {issues} issue(s) found. See above for details.");
        Err(format!("{issues} issue(s) found").into())
    }
}

async fn probe(config: &AppConfig) -> Result<bool, CompletionError> {
    let provider = askdesk_providers::build_from_config(config)
        .map_err(|e| CompletionError::Transient(e.to_string()))?;
    provider.health_check().await
}
