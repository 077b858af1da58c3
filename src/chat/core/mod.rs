//! Core chat types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod session;

pub use config::{ChatConfig, FeedConfig, NotifyConfig, StorageConfig};
pub use errors::{ChatError, ChatResult};
pub use ids::{MessageId, SessionId, TempId, TempIdGenerator, UserId};
pub use message::{
    ChatMessage, MessageWithSender, Sender, SenderProfile, SenderRole, SYSTEM_SENDER,
};
pub use session::{ChatSession, SessionStatus};
