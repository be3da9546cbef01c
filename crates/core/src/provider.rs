//! Provider trait: the abstraction over hosted completion APIs.
//!
//! A Provider takes the persona instruction plus the latest user text (and,
//! depending on the history policy, earlier turns) and returns generated text
//! or a classified [`CompletionError`].
//!
//! Implementations: Gemini, OpenAI-compatible endpoints, and the retrying wrapper.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;
use crate::message::Turn;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "gemini-2.5-flash", "gpt-4o-mini")
    pub model: String,

    /// System-level persona instruction
    pub instruction: String,

    /// Earlier turns sent as context; empty under the latest-only policy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Turn>,

    /// The new user message
    pub user_text: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        instruction: impl Into<String>,
        user_text: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            instruction: instruction.into(),
            history: Vec::new(),
            user_text: user_text.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    /// Attach prior turns. Advisory turns are dropped: they were never model output.
    pub fn with_history(mut self, turns: &[Turn]) -> Self {
        self.history = turns.iter().filter(|t| !t.is_advisory()).cloned().collect();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A successful completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The orchestrator calls `complete()` without knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError>;

    /// Check that the provider is reachable and accepts our credential.
    ///
    /// An `Err(Unauthorized)` here is treated as fatal at startup.
    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::AdvisoryKind;

    #[test]
    fn request_defaults() {
        let req = CompletionRequest::new("gemini-2.5-flash", "be nice", "hello");
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.history.is_empty());
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn history_skips_advisories() {
        let turns = vec![
            Turn::user("Hi"),
            Turn::advisory(AdvisoryKind::Transient, "try again"),
            Turn::user("Hi again"),
            Turn::assistant("Hello!"),
        ];
        let req = CompletionRequest::new("m", "i", "next").with_history(&turns);
        assert_eq!(req.history.len(), 3);
        assert!(req.history.iter().all(|t| !t.is_advisory()));
    }
}
