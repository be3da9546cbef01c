//! Startup: turn an [`AppConfig`] into a ready [`Runtime`].
//!
//! Every fatal condition is checked here, before any socket is bound:
//! missing credential, unreadable or invalid knowledge document, provider
//! construction, and (optionally) a credential probe against the provider.

use askdesk_config::{AppConfig, PersonaConfig};
use askdesk_core::provider::Provider;
use askdesk_core::{ChatSession, CompletionError, KnowledgeDocument, PersonaBuilder, SessionId, Turn};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{StartupError, SubmitError};
use crate::orchestrator::ChatOrchestrator;
use crate::sessions::SessionStore;

/// Persona settings from configuration.
pub fn persona_builder(config: &PersonaConfig) -> PersonaBuilder {
    PersonaBuilder::new()
        .role(&config.role)
        .organization(config.organization.clone())
        .tone(&config.tone)
        .rules(config.rules.clone())
}

/// Everything a front-end needs: shared, read-only after startup.
pub struct Runtime {
    pub config: AppConfig,
    pub knowledge: Arc<KnowledgeDocument>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub sessions: Arc<SessionStore>,
    started_at: Instant,
}

impl Runtime {
    /// Validate configuration, load knowledge, and build the provider.
    pub async fn bootstrap(config: AppConfig) -> Result<Self, StartupError> {
        config.validate()?;
        config.require_api_key()?;

        let knowledge = KnowledgeDocument::load(&config.knowledge.path)?;
        let provider = askdesk_providers::build_from_config(&config)?;

        if config.verify_credential {
            verify_credential(provider.as_ref()).await?;
        }

        Ok(Self::from_parts(config, knowledge, provider))
    }

    /// Assemble a runtime from already-validated parts.
    pub fn from_parts(
        config: AppConfig,
        knowledge: KnowledgeDocument,
        provider: Arc<dyn Provider>,
    ) -> Self {
        let instruction = Arc::new(persona_builder(&config.persona).build(&knowledge));
        let orchestrator = ChatOrchestrator::from_config(provider, instruction, &config);
        let sessions = SessionStore::new(config.conversation.max_sessions);

        info!(
            provider = %orchestrator.provider_name(),
            model = %orchestrator.model(),
            history = %orchestrator.history_policy(),
            knowledge = %config.knowledge.path.display(),
            fallback_contact = %knowledge.fallback_contact(),
            instruction_tokens = orchestrator.instruction().estimated_tokens(),
            "Runtime ready"
        );

        Self {
            config,
            knowledge: Arc::new(knowledge),
            orchestrator: Arc::new(orchestrator),
            sessions: Arc::new(sessions),
            started_at: Instant::now(),
        }
    }

    /// Submit a message to a stored session.
    ///
    /// Empty text is rejected before the session is looked up.
    pub async fn submit(&self, id: &SessionId, text: &str) -> Result<Vec<Turn>, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyMessage);
        }
        let mut session = self.sessions.checkout(id).await?;
        let session: &mut ChatSession = &mut session;
        self.orchestrator.submit(session, text).await
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

async fn verify_credential(provider: &dyn Provider) -> Result<(), StartupError> {
    match provider.health_check().await {
        Ok(true) => {
            info!(provider = %provider.name(), "Credential verified");
            Ok(())
        }
        Ok(false) => {
            warn!(provider = %provider.name(), "Credential probe inconclusive, continuing");
            Ok(())
        }
        Err(CompletionError::Unauthorized(reason)) => Err(StartupError::CredentialRejected {
            provider: provider.name().to_string(),
            reason,
        }),
        Err(e) => {
            warn!(provider = %provider.name(), error = %e, "Credential probe failed, continuing");
            Ok(())
        }
    }
}
