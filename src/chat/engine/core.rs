//! Chat engine orchestration: session lifecycle, sends, and fan-out.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{SessionId, UserId};
use crate::chat::core::message::{
    ChatMessage, MessageWithSender, Sender, SenderProfile, SenderRole,
};
use crate::chat::core::session::{ChatSession, SessionStatus};
use crate::chat::feed::event::ChangeEvent;
use crate::chat::feed::hub::FeedHub;
use crate::chat::notify::dispatcher::NotificationDispatcher;
use crate::chat::storage::{ChatBackends, MessageStore, ProfileStore, SessionStore};

/// System notice stored when an admin closes a session.
pub const SESSION_CLOSED_NOTICE: &str =
    "このチャットセッションは終了しました。新しいチャットを開始してください。";

/// Orchestrates the session lifecycle and message writes over the stores,
/// publishing every row change on the feed.
///
/// The session row is deliberately written without version checks: both the
/// end-user client and the admin console mutate it, transitions are
/// human-paced, and last writer wins on `status`.
pub struct ChatEngine {
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileStore>,
    feed: Arc<FeedHub>,
    dispatcher: Option<NotificationDispatcher>,
}

impl ChatEngine {
    /// Create a new chat engine.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ChatConfig, backends: ChatBackends) -> ChatResult<Self> {
        config.validate()?;
        let dispatcher = NotificationDispatcher::from_config(&config.notify)?;
        if dispatcher.is_none() {
            info!("support notifications disabled (no webhook url)");
        }

        Ok(Self {
            sessions: backends.sessions,
            messages: backends.messages,
            profiles: backends.profiles,
            feed: Arc::new(FeedHub::new(config.feed.channel_capacity)),
            dispatcher,
        })
    }

    /// The change feed clients subscribe to.
    #[must_use]
    pub fn feed(&self) -> Arc<FeedHub> {
        Arc::clone(&self.feed)
    }

    /// Most-recently-created session for a user. `None` means the user has
    /// never chatted; their first send creates one.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn latest_session(&self, user_id: UserId) -> ChatResult<Option<ChatSession>> {
        self.sessions.latest_for_user(user_id).await
    }

    /// Fetch a session that must exist.
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] if it does not, or an error if
    /// storage access fails.
    pub async fn session(&self, session_id: SessionId) -> ChatResult<ChatSession> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or(ChatError::SessionNotFound(session_id))
    }

    /// Stored history of a session, oldest first, with sender profiles.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn messages(&self, session_id: SessionId) -> ChatResult<Vec<MessageWithSender>> {
        self.messages.list_for_session(session_id).await
    }

    /// Display profile for a user, if one exists.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn profile(&self, user_id: UserId) -> ChatResult<Option<SenderProfile>> {
        self.profiles.get(user_id).await
    }

    /// Create a fresh `unread` session for a user, carrying
    /// `initial_content` as its first message. Empty content (an explicit
    /// "start new chat" without text) skips the message entirely.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn create_session(
        &self,
        user_id: UserId,
        initial_content: &str,
    ) -> ChatResult<(ChatSession, Option<ChatMessage>)> {
        let now = Utc::now();
        let session = ChatSession::new(user_id, now);
        self.sessions.insert(&session).await?;
        self.feed.publish_session(ChangeEvent::Inserted {
            new: session.clone(),
        });
        info!(session_id = %session.id, user_id = %user_id, "chat session created");

        let content = initial_content.trim();
        if content.is_empty() {
            return Ok((session, None));
        }

        let first = self
            .store_message(&session, Sender::User(user_id), SenderRole::EndUser, content)
            .await?;
        Ok((session, Some(first)))
    }

    /// Persist a message and fan it out.
    ///
    /// Bumps the session's `updated_at`, publishes the insert on the message
    /// feed and the bumped row on the session feed, and — for end-user
    /// sends — hands the message to the notification dispatcher. The role is
    /// a capability parameter supplied by the caller, not looked up here.
    ///
    /// # Errors
    /// Returns [`ChatError::SessionNotFound`] for an unknown session, or an
    /// error if storage access fails.
    pub async fn send_message(
        &self,
        session_id: SessionId,
        sender: Sender,
        role: SenderRole,
        content: &str,
    ) -> ChatResult<ChatMessage> {
        let session = self.session(session_id).await?;
        self.store_message(&session, sender, role, content).await
    }

    /// Mark a session `read`. Invoked by the admin console on first open of
    /// an `unread` session.
    ///
    /// # Errors
    /// Returns an error if the session is unknown or storage access fails.
    pub async fn mark_read(&self, session_id: SessionId) -> ChatResult<()> {
        let _ = self.set_status(session_id, SessionStatus::Read).await?;
        Ok(())
    }

    /// Mark a session `active`. Best-effort: failures are logged, never
    /// surfaced.
    pub async fn mark_active(&self, session_id: SessionId) {
        if let Err(err) = self.set_status(session_id, SessionStatus::Active).await {
            warn!(%session_id, ?err, "failed to mark session active");
        }
    }

    /// Close a session: store the closure notice, then flip the status.
    ///
    /// # Errors
    /// Returns an error if either step fails. When the status update fails
    /// after the notice was stored there is no compensating delete; the
    /// session keeps the notice while technically remaining open.
    pub async fn close(&self, session_id: SessionId) -> ChatResult<()> {
        let session = self.session(session_id).await?;
        let _ = self
            .store_message(
                &session,
                Sender::System,
                SenderRole::Admin,
                SESSION_CLOSED_NOTICE,
            )
            .await?;
        let _ = self.set_status(session_id, SessionStatus::Closed).await?;
        info!(%session_id, "chat session closed");
        Ok(())
    }

    async fn store_message(
        &self,
        session: &ChatSession,
        sender: Sender,
        role: SenderRole,
        content: &str,
    ) -> ChatResult<ChatMessage> {
        let now = Utc::now();
        let message = ChatMessage::new(session.id, sender, content, now);
        self.messages.insert(&message).await?;
        self.sessions.touch(session.id, now).await?;
        debug!(session_id = %session.id, message_id = %message.id, "message stored");

        self.feed.publish_message(ChangeEvent::Inserted {
            new: message.clone(),
        });
        let mut bumped = session.clone();
        bumped.updated_at = now;
        self.feed.publish_session(ChangeEvent::Updated {
            new: bumped,
            old: Some(session.clone()),
        });

        if role.notifies_support() {
            if let (Some(dispatcher), Some(user_id)) = (&self.dispatcher, sender.user_id()) {
                dispatcher.dispatch(user_id, &message);
            }
        }

        Ok(message)
    }

    async fn set_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> ChatResult<ChatSession> {
        let old = self.session(session_id).await?;
        let now = Utc::now();
        self.sessions.update_status(session_id, status, now).await?;

        let mut new = old.clone();
        new.status = status;
        new.updated_at = now;
        self.feed.publish_session(ChangeEvent::Updated {
            new: new.clone(),
            old: Some(old),
        });
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::config::StorageConfig;
    use crate::chat::storage::tests::open_test_connection;

    async fn test_engine() -> ChatEngine {
        let conn = open_test_connection().await;
        let config = ChatConfig::default();
        let backends = ChatBackends::from_connection(conn, &StorageConfig::default())
            .await
            .unwrap();
        ChatEngine::new(&config, backends).unwrap()
    }

    #[tokio::test]
    async fn first_contact_creates_unread_session_with_one_message() {
        let engine = test_engine().await;
        let user = UserId::new();

        assert!(engine.latest_session(user).await.unwrap().is_none());

        let (session, first) = engine.create_session(user, "Hello").await.unwrap();
        assert_eq!(session.status, SessionStatus::Unread);
        let first = first.unwrap();
        assert_eq!(first.sender, Sender::User(user));

        let history = engine.messages(session.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message.content, "Hello");

        let latest = engine.latest_session(user).await.unwrap().unwrap();
        assert_eq!(latest.id, session.id);
    }

    #[tokio::test]
    async fn empty_initial_content_skips_the_first_message() {
        let engine = test_engine().await;
        let (session, first) = engine.create_session(UserId::new(), "  ").await.unwrap();
        assert!(first.is_none());
        assert!(engine.messages(session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_reply_advances_updated_at_and_reaches_subscribers() {
        let engine = test_engine().await;
        let user = UserId::new();
        let admin = UserId::new();

        let (session, _) = engine.create_session(user, "Hello").await.unwrap();
        let feed = engine.feed();
        let mut subscription = feed.subscribe_messages(session.id);

        engine.mark_read(session.id).await.unwrap();
        let read = engine.session(session.id).await.unwrap();
        assert_eq!(read.status, SessionStatus::Read);

        let reply = engine
            .send_message(session.id, Sender::User(admin), SenderRole::Admin, "Hi there")
            .await
            .unwrap();

        let after = engine.session(session.id).await.unwrap();
        assert!(after.updated_at >= read.updated_at);

        let event = subscription.try_recv().unwrap();
        assert_eq!(event, ChangeEvent::Inserted { new: reply });
    }

    #[tokio::test]
    async fn close_stores_the_notice_last_and_flips_status() {
        let engine = test_engine().await;
        let user = UserId::new();

        let (session, _) = engine.create_session(user, "Hello").await.unwrap();
        engine.close(session.id).await.unwrap();

        let closed = engine.session(session.id).await.unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);

        let history = engine.messages(session.id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.message.sender, Sender::System);
        assert_eq!(last.message.content, SESSION_CLOSED_NOTICE);

        // Continuing requires a fresh session with a new identity.
        let (next, _) = engine.create_session(user, "").await.unwrap();
        assert_ne!(next.id, session.id);
        assert_eq!(next.status, SessionStatus::Unread);
    }

    #[tokio::test]
    async fn sending_into_an_unknown_session_is_an_error() {
        let engine = test_engine().await;
        let missing = SessionId::new();
        let err = engine
            .send_message(
                missing,
                Sender::User(UserId::new()),
                SenderRole::EndUser,
                "hello",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::SessionNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn mark_active_swallows_failures() {
        let engine = test_engine().await;
        // Unknown session: the failure is logged, not returned.
        engine.mark_active(SessionId::new()).await;

        let (session, _) = engine.create_session(UserId::new(), "Hello").await.unwrap();
        engine.mark_active(session.id).await;
        let active = engine.session(session.id).await.unwrap();
        assert_eq!(active.status, SessionStatus::Active);
    }
}
