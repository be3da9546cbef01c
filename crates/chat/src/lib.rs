//! Chat orchestration for askdesk.
//!
//! Owns the per-message cycle ([`ChatOrchestrator`]), the in-memory
//! [`SessionStore`], and the startup sequence that wires them to a provider
//! ([`Runtime::bootstrap`]).

pub mod bootstrap;
pub mod error;
pub mod orchestrator;
pub mod sessions;

pub use bootstrap::{Runtime, persona_builder};
pub use error::{SessionError, StartupError, SubmitError};
pub use orchestrator::ChatOrchestrator;
pub use sessions::{SessionGuard, SessionStore, SessionSummary};
