//! Sender profile storage for message display.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::UserId;
use crate::chat::core::message::SenderProfile;
use crate::chat::storage::StoreFuture;

/// Sender profile store trait.
pub trait ProfileStore: Send + Sync {
    /// Get a profile by user ID.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, user_id: UserId) -> StoreFuture<'_, ChatResult<Option<SenderProfile>>>;

    /// Insert or update a profile.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn upsert(&self, profile: &SenderProfile) -> StoreFuture<'_, ChatResult<()>>;
}

/// `SQLite` implementation of the profile store.
pub struct SqliteProfileStore {
    conn: Arc<Connection>,
    table: String,
}

impl SqliteProfileStore {
    /// Initialize the store and create the table if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if database operations fail.
    pub async fn new(conn: Arc<Connection>, config: &StorageConfig) -> ChatResult<Self> {
        let table = config.profiles_table.clone();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL,
                    first_name TEXT,
                    last_name TEXT,
                    avatar_url TEXT
                )"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }
}

impl ProfileStore for SqliteProfileStore {
    fn get(&self, user_id: UserId) -> StoreFuture<'_, ChatResult<Option<SenderProfile>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let row = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, email, first_name, last_name, avatar_url
                         FROM {table}
                         WHERE id = ?1"
                    ))?;
                    let row = stmt
                        .query_row(rusqlite::params![user_id], |row| {
                            Ok(SenderProfile {
                                id: row.get(0)?,
                                email: row.get(1)?,
                                first_name: row.get(2)?,
                                last_name: row.get(3)?,
                                avatar_url: row.get(4)?,
                            })
                        })
                        .optional()?;
                    Ok(row)
                })
                .await?;
            Ok(row)
        })
    }

    fn upsert(&self, profile: &SenderProfile) -> StoreFuture<'_, ChatResult<()>> {
        let profile = profile.clone();
        Box::pin(async move {
            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT OR REPLACE INTO {table}
                             (id, email, first_name, last_name, avatar_url)
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ),
                        rusqlite::params![
                            profile.id,
                            profile.email,
                            profile.first_name,
                            profile.last_name,
                            profile.avatar_url
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }
}
