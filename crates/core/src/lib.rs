//! # askdesk Core
//!
//! Domain types, traits, and error definitions for the askdesk chat assistant.
//! This crate has **no framework dependencies**: it defines the domain model
//! that the provider, chat, and gateway crates implement against.
//!
//! ## Pieces
//!
//! - [`knowledge`]: the static knowledge document, loaded once at startup
//! - [`persona`]: builds the persona instruction from that document
//! - [`message`]: turns and the per-session transcript
//! - [`provider`]: the completion-provider trait
//! - [`error`]: error taxonomy shared across crates

pub mod error;
pub mod knowledge;
pub mod message;
pub mod persona;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{CompletionError, KnowledgeError};
pub use knowledge::KnowledgeDocument;
pub use message::{AdvisoryKind, ChatSession, Role, SessionId, Turn};
pub use persona::{PersonaBuilder, PersonaInstruction};
pub use provider::{CompletionRequest, CompletionResponse, Provider, Usage};
