//! Error taxonomy for a chat session.

use thiserror::Error;

/// Everything that can go wrong within one turn of the chat loop.
///
/// None of these end the session on their own; the loop reports them and
/// goes back to reading input.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The server could not be reached (refused, timed out, DNS).
    #[error("cannot reach Ollama at {host}: {reason}")]
    Connection { host: String, reason: String },

    /// The server answered, but not with a usable reply.
    #[error("bad response from Ollama: {0}")]
    Response(String),

    /// The user typed something that cannot be acted on.
    #[error("{0}")]
    Input(String),
}

impl ChatError {
    pub fn is_connection(&self) -> bool {
        matches!(self, ChatError::Connection { .. })
    }
}
