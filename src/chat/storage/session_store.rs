//! SQLite-backed chat session store.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{SessionId, UserId};
use crate::chat::core::session::{ChatSession, SessionStatus};
use crate::chat::storage::{timestamp_from_millis, StoreFuture};

/// Raw row shape handed out of the database closure before decoding.
type SessionRow = (SessionId, UserId, String, i64, i64);

/// Chat session store trait.
pub trait SessionStore: Send + Sync {
    /// Persist a freshly created session.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn insert(&self, session: &ChatSession) -> StoreFuture<'_, ChatResult<()>>;

    /// Fetch a session by ID.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, id: SessionId) -> StoreFuture<'_, ChatResult<Option<ChatSession>>>;

    /// Most-recently-created session for a user, or `None` if the user has
    /// never chatted. Absence is a normal outcome, not an error.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn latest_for_user(&self, user_id: UserId) -> StoreFuture<'_, ChatResult<Option<ChatSession>>>;

    /// Set the session status and bump `updated_at`.
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] if the session does not exist,
    /// or an error if storage access fails.
    fn update_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, ChatResult<()>>;

    /// Bump `updated_at` on message activity.
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] if the session does not exist,
    /// or an error if storage access fails.
    fn touch(&self, id: SessionId, now: DateTime<Utc>) -> StoreFuture<'_, ChatResult<()>>;
}

/// `SQLite` implementation of the session store.
pub struct SqliteSessionStore {
    conn: Arc<Connection>,
    table: String,
}

impl SqliteSessionStore {
    /// Initialize the store and create the table if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if database operations fail.
    pub async fn new(conn: Arc<Connection>, config: &StorageConfig) -> ChatResult<Self> {
        let table = config.sessions_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_user_created
                    ON {table_name} (user_id, created_at DESC);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }

    fn decode(row: SessionRow) -> ChatResult<ChatSession> {
        let (id, user_id, status, created_at, updated_at) = row;
        let status =
            SessionStatus::from_str(&status).map_err(ChatError::InvalidStatus)?;
        Ok(ChatSession {
            id,
            user_id,
            status,
            created_at: timestamp_from_millis(created_at)?,
            updated_at: timestamp_from_millis(updated_at)?,
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn insert(&self, session: &ChatSession) -> StoreFuture<'_, ChatResult<()>> {
        let session = session.clone();
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, user_id, status, created_at, updated_at)
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ),
                        rusqlite::params![
                            session.id,
                            session.user_id,
                            session.status.as_str(),
                            session.created_at.timestamp_millis(),
                            session.updated_at.timestamp_millis()
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn get(&self, id: SessionId) -> StoreFuture<'_, ChatResult<Option<ChatSession>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let row = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, user_id, status, created_at, updated_at
                         FROM {table}
                         WHERE id = ?1"
                    ))?;
                    let row: Option<SessionRow> = stmt
                        .query_row(rusqlite::params![id], |row| {
                            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                        })
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(Self::decode).transpose()
        })
    }

    fn latest_for_user(&self, user_id: UserId) -> StoreFuture<'_, ChatResult<Option<ChatSession>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let row = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, user_id, status, created_at, updated_at
                         FROM {table}
                         WHERE user_id = ?1
                         ORDER BY created_at DESC
                         LIMIT 1"
                    ))?;
                    let row: Option<SessionRow> = stmt
                        .query_row(rusqlite::params![user_id], |row| {
                            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                        })
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(Self::decode).transpose()
        })
    }

    fn update_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, ChatResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        &format!("UPDATE {table} SET status = ?1, updated_at = ?2 WHERE id = ?3"),
                        rusqlite::params![status.as_str(), now.timestamp_millis(), id],
                    )?;
                    Ok(changed)
                })
                .await?;

            if changed == 0 {
                return Err(ChatError::SessionNotFound(id));
            }
            Ok(())
        })
    }

    fn touch(&self, id: SessionId, now: DateTime<Utc>) -> StoreFuture<'_, ChatResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        &format!("UPDATE {table} SET updated_at = ?1 WHERE id = ?2"),
                        rusqlite::params![now.timestamp_millis(), id],
                    )?;
                    Ok(changed)
                })
                .await?;

            if changed == 0 {
                return Err(ChatError::SessionNotFound(id));
            }
            Ok(())
        })
    }
}
