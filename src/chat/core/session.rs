//! Session model and lifecycle states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::{SessionId, UserId};

/// Lifecycle state of a chat session.
///
/// Transitions in the normal flow: `Unread` (new end-user message, no admin
/// has looked yet) → `Read` (admin opened it) → `Active` (in progress) →
/// `Closed` (admin ended it). `Closed` is terminal; continuing the
/// conversation requires a fresh session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// New end-user message, not yet seen by support.
    Unread,
    /// Opened by an admin.
    Read,
    /// Being handled.
    Active,
    /// Ended by an admin; no further messages accepted client-side.
    Closed,
}

impl SessionStatus {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    /// Whether the session still accepts messages from the client's side.
    #[must_use]
    pub const fn accepts_messages(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unread" => Ok(Self::Unread),
            "read" => Ok(Self::Read),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            _ => Err(value.to_string()),
        }
    }
}

/// One conversation between an end-user and support.
///
/// The session row is mutated by two independent actors (the end-user's
/// client and the admin console) without version checks; last writer wins on
/// `status`. `updated_at` is bumped on every status change and every stored
/// message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique identifier.
    pub id: SessionId,
    /// Owning end-user.
    pub user_id: UserId,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Creation timestamp; ordering key for "latest session".
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Build a fresh `unread` session for a user.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            status: SessionStatus::Unread,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_forms_round_trip() {
        for status in [
            SessionStatus::Unread,
            SessionStatus::Read,
            SessionStatus::Active,
            SessionStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>(), Ok(status));
        }
        assert!("resolved".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn only_closed_sessions_refuse_messages() {
        assert!(SessionStatus::Unread.accepts_messages());
        assert!(SessionStatus::Read.accepts_messages());
        assert!(SessionStatus::Active.accepts_messages());
        assert!(!SessionStatus::Closed.accepts_messages());
    }
}
