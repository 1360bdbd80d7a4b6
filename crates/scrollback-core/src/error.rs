//! Error types for Scrollback.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrollbackError {
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Interaction not found: {interaction_id} in session {session_id}")]
    InteractionNotFound {
        session_id: String,
        interaction_id: String,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ScrollbackError {
    /// Whether this error means a referenced id does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ScrollbackError::MessageNotFound(_)
                | ScrollbackError::InteractionNotFound { .. }
                | ScrollbackError::SessionNotFound(_)
        )
    }
}
