//! Message model: senders, profiles, and the immutable message row.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::{MessageId, SessionId, UserId};

/// Sentinel stored in place of a user ID for automated notices.
pub const SYSTEM_SENDER: &str = "system";

/// Author of a chat message.
///
/// Serialized as the user's UUID string, or the fixed sentinel `"system"`
/// for automated notices (which render with fixed styling and never resolve
/// a profile).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Sender {
    /// A real account (end-user or admin).
    User(UserId),
    /// Automated notice, e.g. the session-closed message.
    System,
}

impl Sender {
    /// The user behind this sender, if any.
    #[must_use]
    pub const fn user_id(self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::System => None,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "{id}"),
            Self::System => f.write_str(SYSTEM_SENDER),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == SYSTEM_SENDER {
            return Ok(Self::System);
        }
        value
            .parse::<UserId>()
            .map(Self::User)
            .map_err(|_| value.to_string())
    }
}

impl From<Sender> for String {
    fn from(value: Sender) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Sender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Capability of the party performing a send.
///
/// Passed into send operations rather than re-queried per message, so the
/// composer can be exercised without a live role lookup.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    /// The end-user asking for support.
    EndUser,
    /// A back-office admin.
    Admin,
}

impl SenderRole {
    /// Whether sends by this role raise a support notification.
    #[must_use]
    pub const fn notifies_support(self) -> bool {
        matches!(self, Self::EndUser)
    }
}

/// Display data for a message sender, joined from the `profiles` relation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SenderProfile {
    /// Account identifier.
    pub id: UserId,
    /// Account email; always present.
    pub email: String,
    /// Given name, if the user filled it in.
    pub first_name: Option<String>,
    /// Family name, if the user filled it in.
    pub last_name: Option<String>,
    /// Avatar image URL, if any.
    pub avatar_url: Option<String>,
}

impl SenderProfile {
    /// Human-readable name: full name when available, email otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

/// A persisted chat message.
///
/// Immutable once created; ordered by `created_at` ascending within its
/// session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned identifier.
    pub id: MessageId,
    /// Parent session.
    pub session_id: SessionId,
    /// Author.
    pub sender: Sender,
    /// Text content. May contain embedded URLs the UI renders as links.
    pub content: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a new message authored by `sender`.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        sender: Sender,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            sender,
            content: content.into(),
            created_at: now,
        }
    }
}

/// A message paired with its sender's display profile, if one exists.
///
/// `sender` is `None` for system notices and for accounts with no profile
/// row.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageWithSender {
    /// The message row.
    pub message: ChatMessage,
    /// Joined profile for display.
    pub sender: Option<SenderProfile>,
}
