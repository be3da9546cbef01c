//! Error types for the askdesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use std::path::PathBuf;
use thiserror::Error;

use crate::message::AdvisoryKind;

// --- Bounded context errors ---

/// A classified failure from a completion provider.
///
/// Per-request: these never end a chat session. The orchestrator turns them
/// into an advisory turn via [`CompletionError::advisory`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    #[error("Provider quota exceeded{}", retry_hint(.retry_after_secs))]
    QuotaExceeded { retry_after_secs: Option<u64> },

    #[error("Provider rejected the credential: {0}")]
    Unauthorized(String),

    #[error("Provider request failed: {0}")]
    Transient(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<CompletionError>,
    },
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    }
}

impl CompletionError {
    /// Whether a caller may reasonably try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. } | Self::Transient(_))
    }

    /// The advisory category shown to the end user.
    pub fn kind(&self) -> AdvisoryKind {
        match self {
            Self::QuotaExceeded { .. } => AdvisoryKind::QuotaExceeded,
            Self::Unauthorized(_) => AdvisoryKind::Unauthorized,
            Self::Transient(_) => AdvisoryKind::Transient,
            Self::RetryExhausted { .. } => AdvisoryKind::RetryExhausted,
        }
    }

    /// Human-readable advisory text for the transcript.
    ///
    /// Never includes provider response bodies; those go to the log.
    pub fn advisory(&self) -> String {
        match self {
            Self::QuotaExceeded { .. } => "The assistant is receiving more questions than its \
                 provider quota allows right now. Please wait a minute and ask again."
                .into(),
            Self::Unauthorized(_) => "The assistant is not able to reach its language model \
                 because its credentials were rejected. Please let the site administrator know."
                .into(),
            Self::Transient(_) => {
                "Sorry, the assistant could not produce an answer just now. Please try again.".into()
            }
            Self::RetryExhausted { attempts, last } => match last.as_ref() {
                Self::QuotaExceeded { .. } => format!(
                    "The assistant is still over its provider quota after {attempts} attempts. \
                     Please wait a few minutes and ask again."
                ),
                _ => format!(
                    "Sorry, the assistant could not produce an answer after {attempts} attempts. \
                     Please try again later."
                ),
            },
        }
    }
}

/// Failures loading or validating the knowledge document.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Knowledge document not found at {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read knowledge document at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse knowledge document at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Knowledge document is missing required field `{field}`")]
    MissingField { field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_error_displays_retry_hint() {
        let err = CompletionError::QuotaExceeded {
            retry_after_secs: Some(30),
        };
        assert!(err.to_string().contains("quota"));
        assert!(err.to_string().contains("30s"));

        let err = CompletionError::QuotaExceeded {
            retry_after_secs: None,
        };
        assert!(!err.to_string().contains("retry after"));
    }

    #[test]
    fn only_quota_and_transient_are_retryable() {
        assert!(CompletionError::QuotaExceeded { retry_after_secs: None }.is_retryable());
        assert!(CompletionError::Transient("503".into()).is_retryable());
        assert!(!CompletionError::Unauthorized("bad key".into()).is_retryable());
        assert!(
            !CompletionError::RetryExhausted {
                attempts: 3,
                last: Box::new(CompletionError::Transient("503".into())),
            }
            .is_retryable()
        );
    }

    #[test]
    fn advisory_does_not_leak_provider_detail() {
        let err = CompletionError::Transient("upstream said: secret-internal-trace".into());
        assert!(!err.advisory().contains("secret-internal-trace"));
    }

    #[test]
    fn exhausted_quota_advisory_mentions_attempts() {
        let err = CompletionError::RetryExhausted {
            attempts: 4,
            last: Box::new(CompletionError::QuotaExceeded {
                retry_after_secs: None,
            }),
        };
        let text = err.advisory();
        assert!(text.contains("4 attempts"));
        assert!(text.contains("quota"));
        assert_eq!(err.kind(), AdvisoryKind::RetryExhausted);
    }

    #[test]
    fn missing_field_names_the_field() {
        let err = KnowledgeError::MissingField {
            field: "contact_info.emails[0]".into(),
        };
        assert!(err.to_string().contains("contact_info.emails[0]"));
    }
}
