//! Support-chat subsystem for the study-abroad portal.
//!
//! This module provides the complete chat lifecycle behind the portal's chat
//! widget and admin console, organized into:
//! - `core`: Configuration, errors, IDs, sessions, messages, and profiles
//! - `storage`: Session, message, and profile stores with `SQLite` backends
//! - `feed`: Typed realtime change events and the in-process hub
//! - `client`: Timeline reconciliation, per-tab view state, and link rendering
//! - `notify`: Rate-limited, fire-and-forget support notifications
//! - `engine`: Orchestration of session lifecycle, sends, and fan-out
//! - `adapters`: Integration helpers (tracing)

pub mod adapters;
pub mod client;
pub mod core;
pub mod engine;
pub mod feed;
pub mod notify;
pub mod storage;

// Re-export commonly used types for convenience
pub use adapters::init_tracing;
pub use client::{ChatView, EntryId, FeedOutcome, LinkExtractor, MessageSegment, Timeline, TimelineEntry};
pub use core::{
    ChatConfig, ChatError, ChatMessage, ChatResult, ChatSession, FeedConfig, MessageId,
    MessageWithSender, NotifyConfig, Sender, SenderProfile, SenderRole, SessionId, SessionStatus,
    StorageConfig, TempId, TempIdGenerator, UserId, SYSTEM_SENDER,
};
pub use engine::{ChatEngine, SESSION_CLOSED_NOTICE};
pub use feed::{ChangeEvent, FeedHub, FeedSubscription};
pub use notify::{NotificationDispatcher, RateLimiter, SlackWebhook};
pub use storage::{
    ChatBackends, MessageStore, ProfileStore, SessionStore, SqliteMessageStore,
    SqliteProfileStore, SqliteSessionStore, StoreFuture,
};
