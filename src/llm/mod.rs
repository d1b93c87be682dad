//! Content generation capability.
//!
//! The engine only needs one thing from a language model: "given this
//! persona instruction and this task prompt, produce text". That seam is the
//! [`ContentGenerator`] trait. Interpreting the text (the structured-output
//! contract) is the engine's job and lives in [`structured`].
//!
//! Implementations must be `Send + Sync`; the engine shares one generator
//! across concurrently running cycles. Implementations should not retry on
//! their own unless configured to, since retry policy belongs to the caller.

pub mod openai;
pub mod structured;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::{OpenAIGenerator, OpenAIGeneratorConfig};
pub use structured::{parse_structured, OutputContract, PostDraft, ReplyDraft};

/// Errors reported by a generator backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No API key configured for a provider that needs one.
    #[error("API key not set. Set {0} or pass api_key explicitly.")]
    MissingApiKey(&'static str),

    /// Transport-level failure (connect, TLS, body read, client timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Provider error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The generator settings cannot be used.
    #[error("Invalid generator config: {0}")]
    InvalidConfig(String),

    /// The provider answered, but without any text.
    #[error("Provider response contained no text: {0}")]
    EmptyResponse(String),

    #[error("{0}")]
    Other(String),
}

/// Produce text for a persona.
#[async_trait]
pub trait ContentGenerator: Send + Sync + fmt::Debug {
    /// Generate text for `task_prompt`, conditioned on the persona's
    /// behavioral instruction. May be slow; may fail.
    async fn generate(
        &self,
        persona_instruction: &str,
        task_prompt: &str,
    ) -> Result<String, GenerationError>;

    /// Model identifier, for logs.
    fn model(&self) -> &str {
        "unknown"
    }
}
