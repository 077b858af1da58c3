//! Configuration for the chat subsystem.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Top-level configuration for the chat engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Realtime feed settings.
    pub feed: FeedConfig,
    /// Notification dispatch settings.
    pub notify: NotifyConfig,
}

impl ChatConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.storage.sessions_table.is_empty()
            || self.storage.messages_table.is_empty()
            || self.storage.profiles_table.is_empty()
        {
            return Err(ChatError::InvalidConfig(
                "storage table names must not be empty".to_string(),
            ));
        }

        if self.feed.channel_capacity == 0 {
            return Err(ChatError::InvalidConfig(
                "feed.channel_capacity must be > 0".to_string(),
            ));
        }

        if self.notify.window_seconds == 0 {
            return Err(ChatError::InvalidConfig(
                "notify.window_seconds must be > 0".to_string(),
            ));
        }

        if let Some(webhook_url) = &self.notify.webhook_url {
            Url::parse(webhook_url)?;
        }

        Ok(())
    }
}

/// Storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the `SQLite` database file.
    pub sqlite_path: PathBuf,
    /// Table holding chat sessions.
    pub sessions_table: String,
    /// Table holding chat messages.
    pub messages_table: String,
    /// Table holding sender profiles for display.
    pub profiles_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("support_chat.db"),
            sessions_table: "chat_sessions".to_string(),
            messages_table: "messages".to_string(),
            profiles_table: "profiles".to_string(),
        }
    }
}

/// Realtime feed settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Buffered events per channel before slow subscribers observe a lag.
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Notification dispatch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Slack incoming-webhook URL. Dispatch is disabled when absent.
    pub webhook_url: Option<String>,
    /// Rolling per-user window between outbound notifications.
    pub window_seconds: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            window_seconds: 3600,
        }
    }
}
