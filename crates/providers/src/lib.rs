//! Completion provider implementations for askdesk.
//!
//! All providers implement the `askdesk_core::Provider` trait.
//! The router builds the configured one and wraps it for retries.

pub mod gemini;
mod http;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryingProvider};
pub use router::{BuildError, build_from_config, default_base_url};
