//! Provider construction from configuration.
//!
//! Picks the backend named by `config.provider`, applies the base URL and
//! timeout, and wraps the result in a [`RetryingProvider`].

use askdesk_config::AppConfig;
use askdesk_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::gemini::{self, GeminiProvider};
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::{RetryPolicy, RetryingProvider};

/// Failures building a provider from configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Unknown provider '{0}': set api_url to use it as an OpenAI-compatible endpoint")]
    UnknownProvider(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Build the configured provider, retry wrapper included.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, BuildError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let api_key = config.api_key.clone().unwrap_or_default();

    let base: Arc<dyn Provider> = if config.provider == "gemini" {
        let mut p = GeminiProvider::new(api_key, timeout)?;
        if let Some(url) = &config.api_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let base_url = match &config.api_url {
            Some(url) => url.clone(),
            None => default_base_url(&config.provider)
                .ok_or_else(|| BuildError::UnknownProvider(config.provider.clone()))?
                .to_string(),
        };
        Arc::new(OpenAiCompatProvider::new(
            &config.provider,
            base_url,
            api_key,
            timeout,
        )?)
    };

    let policy = RetryPolicy::from_config(&config.retry);
    info!(
        provider = %config.provider,
        model = %config.model,
        timeout_secs = config.request_timeout_secs,
        max_attempts = policy.max_attempts,
        "Completion provider ready"
    );

    Ok(Arc::new(RetryingProvider::new(base, policy)))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    Some(match provider_name {
        "gemini" => gemini::DEFAULT_BASE_URL,
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        _ => return None,
    })
}
