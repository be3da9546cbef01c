//! The per-message chat cycle.
//!
//! `submit` moves one session through `Idle → AwaitingResponse → Idle`:
//! the provider is called once, then the user turn and either the answer
//! or an advisory are appended as a pair. Provider failures never escape;
//! they end up in the transcript as advisory turns.

use askdesk_config::{AppConfig, HistoryPolicy};
use askdesk_core::provider::{CompletionRequest, Provider};
use askdesk_core::{ChatSession, CompletionError, PersonaInstruction, Turn};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SubmitError;

pub struct ChatOrchestrator {
    provider: Arc<dyn Provider>,
    instruction: Arc<PersonaInstruction>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    history: HistoryPolicy,
}

impl ChatOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        instruction: Arc<PersonaInstruction>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            instruction,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            history: HistoryPolicy::default(),
        }
    }

    /// Model parameters and history policy from configuration.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        instruction: Arc<PersonaInstruction>,
        config: &AppConfig,
    ) -> Self {
        Self::new(provider, instruction, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_history(config.conversation.history)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Choose whether earlier turns are sent along with the new message.
    pub fn with_history(mut self, history: HistoryPolicy) -> Self {
        self.history = history;
        self
    }

    pub fn instruction(&self) -> &PersonaInstruction {
        &self.instruction
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history_policy(&self) -> HistoryPolicy {
        self.history
    }

    /// Process one user message against `session`.
    ///
    /// Returns the turns appended by this call: the user turn followed by
    /// the assistant answer or advisory. Whitespace-only text is rejected
    /// before anything is appended.
    ///
    /// Both turns are appended together once the provider call settles, so
    /// dropping this future mid-call leaves the session untouched.
    pub async fn submit(
        &self,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<Vec<Turn>, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyMessage);
        }

        let question = Turn::user(text);
        let mut request = CompletionRequest::new(&self.model, self.instruction.text(), text)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if self.history == HistoryPolicy::Full {
            request = request.with_history(session.turns());
        }

        debug!(
            session_id = %session.id,
            chars = text.len(),
            history = request.history.len(),
            "Submitting message"
        );

        let reply = match self.provider.complete(request).await {
            Ok(response) => {
                info!(
                    session_id = %session.id,
                    model = %response.model,
                    chars = response.text.len(),
                    tokens = response.usage.as_ref().map(|u| u.total_tokens),
                    "Answer received"
                );
                Turn::assistant(response.text)
            }
            Err(err) => {
                warn!(
                    session_id = %session.id,
                    kind = ?err.kind(),
                    error = %err,
                    "Completion failed, appending advisory"
                );
                Turn::advisory(err.kind(), self.advisory_text(&err))
            }
        };

        let start = session.len();
        session.push(question);
        session.push(reply);
        Ok(session.since(start).to_vec())
    }

    /// The user-facing advisory, pointing at the fallback contact.
    fn advisory_text(&self, err: &CompletionError) -> String {
        format!(
            "{} For urgent questions you can also write to {}.",
            err.advisory(),
            self.instruction.fallback_contact()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdesk_core::provider::CompletionResponse;
    use askdesk_core::{AdvisoryKind, PersonaBuilder, Role};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers with a fixed result and records every request it sees.
    struct MockProvider {
        outcome: Result<String, CompletionError>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl MockProvider {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(text.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: CompletionError) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(err),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            let model = request.model.clone();
            self.seen.lock().unwrap().push(request);
            self.outcome.clone().map(|text| CompletionResponse {
                text,
                model,
                usage: None,
            })
        }
    }

    fn instruction() -> Arc<PersonaInstruction> {
        let persona = PersonaBuilder::new()
            .build_from_value(json!({
                "name": "EIT Faridabad",
                "contact_info": {"emails": ["admissions@example.edu"]}
            }))
            .unwrap();
        Arc::new(persona)
    }

    #[tokio::test]
    async fn appends_user_then_assistant() {
        let provider = MockProvider::answering("Hello! How can I help?");
        let chat = ChatOrchestrator::new(provider.clone(), instruction(), "gemini-2.5-flash");
        let mut session = ChatSession::new();

        let turns = chat.submit(&mut session, "Hi").await.unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "Hi");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].text, "Hello! How can I help?");
        assert_eq!(session.len(), 2);

        let sent = provider.requests();
        assert_eq!(sent[0].user_text, "Hi");
        assert_eq!(sent[0].instruction, chat.instruction().text());
    }

    #[tokio::test]
    async fn empty_message_rejected_without_side_effects() {
        let provider = MockProvider::answering("unused");
        let chat = ChatOrchestrator::new(provider.clone(), instruction(), "m");
        let mut session = ChatSession::new();

        for text in ["", "   ", "\n\t"] {
            assert_eq!(
                chat.submit(&mut session, text).await,
                Err(SubmitError::EmptyMessage)
            );
        }
        assert!(session.is_empty());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn quota_becomes_advisory_turn() {
        let provider = MockProvider::failing(CompletionError::QuotaExceeded {
            retry_after_secs: Some(30),
        });
        let chat = ChatOrchestrator::new(provider, instruction(), "m");
        let mut session = ChatSession::new();

        let turns = chat.submit(&mut session, "What are the fees?").await.unwrap();

        assert_eq!(turns.len(), 2);
        let reply = &turns[1];
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.advisory, Some(AdvisoryKind::QuotaExceeded));
        assert!(reply.text.contains("admissions@example.edu"));
    }

    #[tokio::test]
    async fn failures_keep_prior_turns() {
        let ok = MockProvider::answering("We offer B.Tech.");
        let broken = MockProvider::failing(CompletionError::Transient("HTTP 503".into()));
        let mut session = ChatSession::new();

        ChatOrchestrator::new(ok, instruction(), "m")
            .submit(&mut session, "Courses?")
            .await
            .unwrap();
        let turns = ChatOrchestrator::new(broken, instruction(), "m")
            .submit(&mut session, "Fees?")
            .await
            .unwrap();

        assert_eq!(session.len(), 4);
        assert_eq!(session.turns()[1].text, "We offer B.Tech.");
        assert!(turns[1].is_advisory());
        assert!(!turns[1].text.contains("503"));
    }

    #[tokio::test]
    async fn latest_policy_sends_no_history() {
        let provider = MockProvider::answering("ok");
        let chat = ChatOrchestrator::new(provider.clone(), instruction(), "m");
        let mut session = ChatSession::new();

        chat.submit(&mut session, "Hi").await.unwrap();
        chat.submit(&mut session, "What courses exist?").await.unwrap();

        assert!(provider.requests().iter().all(|r| r.history.is_empty()));
    }

    #[tokio::test]
    async fn full_policy_sends_prior_turns_only() {
        let provider = MockProvider::answering("ok");
        let chat = ChatOrchestrator::new(provider.clone(), instruction(), "m")
            .with_history(HistoryPolicy::Full);
        let mut session = ChatSession::new();

        chat.submit(&mut session, "Hi").await.unwrap();
        chat.submit(&mut session, "What courses exist?").await.unwrap();

        let sent = provider.requests();
        assert!(sent[0].history.is_empty());
        assert_eq!(sent[1].history.len(), 2);
        assert_eq!(sent[1].history[0].text, "Hi");
        assert_eq!(sent[1].user_text, "What courses exist?");
    }

    #[tokio::test]
    async fn config_parameters_reach_the_request() {
        let provider = MockProvider::answering("ok");
        let config = AppConfig {
            model: "gemini-2.5-pro".into(),
            temperature: 0.2,
            max_tokens: Some(300),
            ..AppConfig::default()
        };
        let chat = ChatOrchestrator::from_config(provider.clone(), instruction(), &config);
        chat.submit(&mut ChatSession::new(), "Hi").await.unwrap();

        let sent = &provider.requests()[0];
        assert_eq!(sent.model, "gemini-2.5-pro");
        assert!((sent.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(sent.max_tokens, Some(300));
    }

    /// Never answers; stands in for a request the client gave up on.
    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Err(CompletionError::Transient("timed out".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_submit_leaves_no_unanswered_turn() {
        let chat = ChatOrchestrator::new(Arc::new(HangingProvider), instruction(), "m");
        let mut session = ChatSession::new();
        chat.submit(&mut session, "Hi").await.unwrap();
        assert_eq!(session.len(), 2);

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            chat.submit(&mut session, "Are you there?"),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(session.len(), 2);
        assert_eq!(session.len() % 2, 0);
        assert_eq!(session.last().map(|t| t.role), Some(Role::Assistant));
    }
}
