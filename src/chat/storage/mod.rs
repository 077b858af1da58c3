//! Persistent storage for sessions, messages, and sender profiles.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tokio_rusqlite::Connection;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::{ChatError, ChatResult};

pub mod message_store;
pub mod profile_store;
pub mod session_store;

pub use message_store::{MessageStore, SqliteMessageStore};
pub use profile_store::{ProfileStore, SqliteProfileStore};
pub use session_store::{SessionStore, SqliteSessionStore};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Decode an integer-millisecond column into a timestamp.
///
/// # Errors
/// Returns an error if the value is outside the representable range.
pub(crate) fn timestamp_from_millis(millis: i64) -> ChatResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| ChatError::InvalidRow(format!("invalid timestamp: {millis}")))
}

/// Backend dependencies for the chat engine.
///
/// All stores share one `SQLite` connection so the message/profile join sees
/// a single database.
pub struct ChatBackends {
    /// Session store implementation.
    pub sessions: Arc<dyn SessionStore>,
    /// Message store implementation.
    pub messages: Arc<dyn MessageStore>,
    /// Profile store implementation.
    pub profiles: Arc<dyn ProfileStore>,
}

impl ChatBackends {
    /// Build default `SQLite` backends over the configured database file.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn sqlite(config: &StorageConfig) -> ChatResult<Self> {
        let conn = Arc::new(Connection::open(&config.sqlite_path).await?);
        Self::from_connection(conn, config).await
    }

    /// Build `SQLite` backends over an existing shared connection.
    ///
    /// # Errors
    /// Returns an error if any store cannot be initialized.
    pub async fn from_connection(conn: Arc<Connection>, config: &StorageConfig) -> ChatResult<Self> {
        let profiles = Arc::new(SqliteProfileStore::new(Arc::clone(&conn), config).await?);
        let sessions = Arc::new(SqliteSessionStore::new(Arc::clone(&conn), config).await?);
        let messages = Arc::new(SqliteMessageStore::new(conn, config).await?);

        Ok(Self {
            sessions,
            messages,
            profiles,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Open a fresh in-memory database shared by the stores under test.
    pub(crate) async fn open_test_connection() -> Arc<Connection> {
        Arc::new(Connection::open_in_memory().await.unwrap())
    }

    #[test]
    fn rejects_out_of_range_timestamps() {
        assert!(timestamp_from_millis(i64::MAX).is_err());
        assert!(timestamp_from_millis(0).is_ok());
    }
}
