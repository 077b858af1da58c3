//! SQLite-backed chat message store with sender-profile joins.

use std::str::FromStr;
use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{MessageId, SessionId, UserId};
use crate::chat::core::message::{ChatMessage, MessageWithSender, Sender, SenderProfile};
use crate::chat::storage::{timestamp_from_millis, StoreFuture};

/// Raw joined row shape handed out of the database closure before decoding.
type MessageRow = (
    MessageId,
    String,
    String,
    i64,
    Option<UserId>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Chat message store trait.
pub trait MessageStore: Send + Sync {
    /// Persist a message. Messages are immutable once created.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn insert(&self, message: &ChatMessage) -> StoreFuture<'_, ChatResult<()>>;

    /// All messages of a session ordered by `created_at` ascending, each with
    /// the sender's display profile joined in (`None` for system notices and
    /// senders without a profile row).
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> StoreFuture<'_, ChatResult<Vec<MessageWithSender>>>;
}

/// `SQLite` implementation of the message store.
pub struct SqliteMessageStore {
    conn: Arc<Connection>,
    table: String,
    profiles_table: String,
}

impl SqliteMessageStore {
    /// Initialize the store and create the table if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if database operations fail.
    pub async fn new(conn: Arc<Connection>, config: &StorageConfig) -> ChatResult<Self> {
        let table = config.messages_table.clone();
        let profiles_table = config.profiles_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    sender TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_session_created
                    ON {table_name} (session_id, created_at);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            table,
            profiles_table,
        })
    }

    fn decode(session_id: SessionId, row: MessageRow) -> ChatResult<MessageWithSender> {
        let (id, sender, content, created_at, profile_id, email, first_name, last_name, avatar_url) =
            row;
        let sender = Sender::from_str(&sender).map_err(ChatError::InvalidSender)?;
        let profile = match (profile_id, email) {
            (Some(id), Some(email)) => Some(SenderProfile {
                id,
                email,
                first_name,
                last_name,
                avatar_url,
            }),
            _ => None,
        };

        Ok(MessageWithSender {
            message: ChatMessage {
                id,
                session_id,
                sender,
                content,
                created_at: timestamp_from_millis(created_at)?,
            },
            sender: profile,
        })
    }
}

impl MessageStore for SqliteMessageStore {
    fn insert(&self, message: &ChatMessage) -> StoreFuture<'_, ChatResult<()>> {
        let message = message.clone();
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, session_id, sender, content, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ),
                        rusqlite::params![
                            message.id,
                            message.session_id,
                            message.sender.to_string(),
                            message.content,
                            message.created_at.timestamp_millis()
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn list_for_session(
        &self,
        session_id: SessionId,
    ) -> StoreFuture<'_, ChatResult<Vec<MessageWithSender>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let profiles = self.profiles_table.clone();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT m.id, m.sender, m.content, m.created_at,
                                p.id, p.email, p.first_name, p.last_name, p.avatar_url
                         FROM {table} m
                         LEFT JOIN {profiles} p ON p.id = m.sender
                         WHERE m.session_id = ?1
                         ORDER BY m.created_at ASC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![session_id], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                                row.get(5)?,
                                row.get(6)?,
                                row.get(7)?,
                                row.get(8)?,
                            ))
                        })?
                        .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter()
                .map(|row| Self::decode(session_id, row))
                .collect()
        })
    }
}
