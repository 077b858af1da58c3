//! Error types for the chat subsystem.

use thiserror::Error;

use crate::chat::core::ids::SessionId;

/// Chat subsystem error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A stored row carried a status string the model does not know.
    #[error("invalid session status: {0}")]
    InvalidStatus(String),
    /// A stored row carried a sender string that is neither a UUID nor the system sentinel.
    #[error("invalid sender: {0}")]
    InvalidSender(String),
    /// A stored row could not be decoded (bad timestamp or identifier).
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
    /// The referenced session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    /// The session is closed; a new session must be created to continue.
    #[error("session is closed: {0}")]
    SessionClosed(SessionId),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Outbound HTTP error from the notification webhook.
    #[error("webhook error: {0}")]
    Webhook(#[from] reqwest::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
