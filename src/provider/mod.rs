//! Completion providers.
//!
//! The chat loop only knows the [`CompletionProvider`] capability: send a
//! prompt, get generated text back. [`ollama::OllamaProvider`] is the real
//! implementation; tests substitute a scripted fake.

pub mod ollama;

#[cfg(test)]
pub mod fake;

use crate::error::ChatError;
use crate::protocol::ModelInfo;
use async_trait::async_trait;

pub use ollama::OllamaProvider;

/// "Send prompt, receive generated text."
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short backend name for messages and logs.
    fn name(&self) -> &str;

    /// Base address of the server, for error messages.
    fn endpoint(&self) -> &str;

    /// Generate a complete reply to `prompt` with `model`.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, ChatError>;

    /// Models installed on the server.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError>;

    /// Check if the server is available/reachable.
    async fn health_check(&self) -> Result<(), ChatError>;
}
