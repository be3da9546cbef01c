use askdesk_config::ConfigError;
use askdesk_core::{KnowledgeError, SessionId};
use askdesk_providers::BuildError;
use thiserror::Error;

/// Lookup and exclusivity failures in the session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// The session is awaiting a reply to an earlier message.
    #[error("Session {0} is busy with another message")]
    Busy(SessionId),
}

/// Reasons a message was not accepted. Provider failures are not here:
/// they become advisory turns instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Anything that stops the service before it starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error(transparent)]
    Provider(#[from] BuildError),

    #[error("Provider '{provider}' rejected the configured credential ({reason})")]
    CredentialRejected { provider: String, reason: String },
}
