//! Per-tab chat UI state: composing, reconciliation, and feed handling.
//!
//! One [`ChatView`] backs one open chat surface (an end-user widget tab or
//! one admin-console conversation pane). It owns the timeline, the compose
//! draft, and the optimistic-send bookkeeping; the embedding UI pumps feed
//! events into it and renders from [`ChatView::entries`].

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use lru::LruCache;
use tracing::{debug, warn};

use crate::chat::client::timeline::{FeedOutcome, Timeline, TimelineEntry};
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{SessionId, TempIdGenerator, UserId};
use crate::chat::core::message::{ChatMessage, Sender, SenderProfile, SenderRole};
use crate::chat::core::session::{ChatSession, SessionStatus};
use crate::chat::engine::core::ChatEngine;
use crate::chat::feed::event::ChangeEvent;

/// Cached sender profiles per view.
const PROFILE_CACHE_CAPACITY: usize = 64;

/// Client-side chat state for one open UI instance.
pub struct ChatView {
    engine: Arc<ChatEngine>,
    viewer: UserId,
    role: SenderRole,
    session: Option<ChatSession>,
    timeline: Timeline,
    draft: String,
    temp_ids: TempIdGenerator,
    profile_cache: LruCache<UserId, SenderProfile>,
}

impl ChatView {
    fn new(engine: Arc<ChatEngine>, viewer: UserId, role: SenderRole) -> ChatResult<Self> {
        let capacity = NonZeroUsize::new(PROFILE_CACHE_CAPACITY).ok_or_else(|| {
            ChatError::InvalidConfig("profile cache capacity must be > 0".to_string())
        })?;
        Ok(Self {
            engine,
            viewer,
            role,
            session: None,
            timeline: Timeline::new(),
            draft: String::new(),
            temp_ids: TempIdGenerator::new(),
            profile_cache: LruCache::new(capacity),
        })
    }

    /// Open the viewer's most recent session, if any.
    ///
    /// A user who has never chatted gets an empty view; their first send
    /// creates the session.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn open_latest(
        engine: Arc<ChatEngine>,
        viewer: UserId,
        role: SenderRole,
    ) -> ChatResult<Self> {
        let mut view = Self::new(Arc::clone(&engine), viewer, role)?;
        if let Some(session) = engine.latest_session(viewer).await? {
            view.attach_session(session).await?;
        }
        Ok(view)
    }

    /// Open a specific session (admin console path).
    ///
    /// An admin opening an `unread` session marks it `read`.
    ///
    /// # Errors
    /// Returns an error if the session is unknown or storage access fails.
    pub async fn open_session(
        engine: Arc<ChatEngine>,
        session_id: SessionId,
        viewer: UserId,
        role: SenderRole,
    ) -> ChatResult<Self> {
        let mut view = Self::new(Arc::clone(&engine), viewer, role)?;
        let mut session = engine.session(session_id).await?;
        if role == SenderRole::Admin && session.status == SessionStatus::Unread {
            engine.mark_read(session_id).await?;
            session = engine.session(session_id).await?;
        }
        view.attach_session(session).await?;
        Ok(view)
    }

    async fn attach_session(&mut self, session: ChatSession) -> ChatResult<()> {
        let history = self.engine.messages(session.id).await?;
        for item in &history {
            if let Some(profile) = &item.sender {
                self.profile_cache.put(profile.id, profile.clone());
            }
        }
        self.timeline.load(history);
        self.session = Some(session);
        Ok(())
    }

    /// The session currently displayed, if any.
    #[must_use]
    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    /// Rendered timeline entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[TimelineEntry] {
        self.timeline.entries()
    }

    /// Current compose-input content.
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the compose-input content.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Whether the input control is enabled. A closed session refuses sends
    /// until [`Self::start_new_chat`] is called.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.session
            .as_ref()
            .is_none_or(|session| session.status.accepts_messages())
    }

    /// Send the current draft.
    ///
    /// Appends an optimistic entry and clears the input immediately, then
    /// issues the authoritative write. On success the temp entry is
    /// reconciled with the returned row; on failure it is rolled back and
    /// the draft is restored so the user can retry. The first send of a
    /// viewer with no session creates one.
    ///
    /// # Errors
    /// Returns [`ChatError::SessionClosed`] without attempting a write when
    /// the session is closed, or the write error after rollback.
    pub async fn send(&mut self) -> ChatResult<()> {
        let content = self.draft.trim().to_string();
        if content.is_empty() {
            return Ok(());
        }

        let Some(session) = self.session.clone() else {
            return self.first_contact(&content).await;
        };
        if !session.status.accepts_messages() {
            return Err(ChatError::SessionClosed(session.id));
        }

        let temp_id = self.temp_ids.next_id();
        let profile = self.profile_cache.get(&self.viewer).cloned();
        self.timeline.push_optimistic(
            temp_id,
            Sender::User(self.viewer),
            content.clone(),
            Utc::now(),
            profile,
        );
        self.draft.clear();

        match self
            .engine
            .send_message(session.id, Sender::User(self.viewer), self.role, &content)
            .await
        {
            Ok(row) => {
                self.reconcile_ack(&row);
                if let Some(session) = &mut self.session {
                    session.updated_at = row.created_at;
                }
                Ok(())
            }
            Err(err) => {
                if let Some(original) = self.timeline.remove_temp(temp_id) {
                    self.draft = original;
                }
                warn!(session_id = %session.id, ?err, "send failed; optimistic entry rolled back");
                Err(err)
            }
        }
    }

    /// Explicitly start a fresh chat, discarding the old session id.
    ///
    /// Used from the "start new chat" affordance shown once a session is
    /// closed. The new session starts empty.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn start_new_chat(&mut self) -> ChatResult<()> {
        let (session, _) = self.engine.create_session(self.viewer, "").await?;
        self.session = Some(session);
        self.timeline = Timeline::new();
        Ok(())
    }

    /// Apply a realtime message event for the displayed session.
    ///
    /// Events for other sessions are ignored. Newly appended entries get the
    /// sender's cached profile attached when available.
    pub fn apply_message_event(&mut self, event: &ChangeEvent<ChatMessage>) -> FeedOutcome {
        let Some(session) = &self.session else {
            return FeedOutcome::Ignored;
        };
        if event.new_row().session_id != session.id {
            return FeedOutcome::Ignored;
        }

        let profile = event
            .new_row()
            .sender
            .user_id()
            .and_then(|user_id| self.profile_cache.get(&user_id).cloned());
        let outcome = self.timeline.apply_event(event, profile);
        debug!(?outcome, "feed message event applied");
        outcome
    }

    /// Apply a realtime session-row event for the displayed session.
    ///
    /// A `closed` row disables the input until a new chat is started.
    pub fn apply_session_event(&mut self, event: &ChangeEvent<ChatSession>) {
        let Some(session) = &mut self.session else {
            return;
        };
        if event.new_row().id != session.id {
            return;
        }
        *session = event.new_row().clone();
    }

    /// Fetch and cache a sender's profile, backfilling rendered entries.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn refresh_profile(&mut self, user_id: UserId) -> ChatResult<()> {
        if let Some(profile) = self.engine.profile(user_id).await? {
            self.timeline.attach_profile(&profile);
            self.profile_cache.put(user_id, profile);
        }
        Ok(())
    }

    async fn first_contact(&mut self, content: &str) -> ChatResult<()> {
        let (session, first) = self.engine.create_session(self.viewer, content).await?;
        self.draft.clear();
        if let Some(row) = first {
            let profile = self.profile_cache.get(&self.viewer).cloned();
            self.timeline
                .apply_event(&ChangeEvent::Inserted { new: row }, profile);
        }
        self.session = Some(session);
        Ok(())
    }

    fn reconcile_ack(&mut self, row: &ChatMessage) {
        // The feed may have delivered the row first; both paths are
        // idempotent.
        if self.timeline.contains_server_id(row.id) {
            return;
        }
        if self.timeline.resolve_temp(row).is_none() {
            let profile = row
                .sender
                .user_id()
                .and_then(|user_id| self.profile_cache.get(&user_id).cloned());
            self.timeline
                .apply_event(&ChangeEvent::Inserted { new: row.clone() }, profile);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::client::timeline::EntryId;
    use crate::chat::core::config::{ChatConfig, StorageConfig};
    use crate::chat::core::message::MessageWithSender;
    use crate::chat::engine::core::SESSION_CLOSED_NOTICE;
    use crate::chat::storage::tests::open_test_connection;
    use crate::chat::storage::{
        ChatBackends, MessageStore, SqliteProfileStore, SqliteSessionStore, StoreFuture,
    };

    async fn test_engine() -> Arc<ChatEngine> {
        let conn = open_test_connection().await;
        let backends = ChatBackends::from_connection(conn, &StorageConfig::default())
            .await
            .unwrap();
        Arc::new(ChatEngine::new(&ChatConfig::default(), backends).unwrap())
    }

    /// Message store whose writes always fail, for rollback tests.
    struct FailingMessageStore;

    impl MessageStore for FailingMessageStore {
        fn insert(&self, _message: &ChatMessage) -> StoreFuture<'_, ChatResult<()>> {
            Box::pin(async {
                Err(ChatError::InvalidConfig(
                    "simulated write failure".to_string(),
                ))
            })
        }

        fn list_for_session(
            &self,
            _session_id: SessionId,
        ) -> StoreFuture<'_, ChatResult<Vec<MessageWithSender>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    async fn engine_with_failing_writes() -> Arc<ChatEngine> {
        let conn = open_test_connection().await;
        let config = StorageConfig::default();
        let profiles = Arc::new(
            SqliteProfileStore::new(Arc::clone(&conn), &config)
                .await
                .unwrap(),
        );
        let sessions = Arc::new(SqliteSessionStore::new(conn, &config).await.unwrap());
        let backends = ChatBackends {
            sessions,
            messages: Arc::new(FailingMessageStore),
            profiles,
        };
        Arc::new(ChatEngine::new(&ChatConfig::default(), backends).unwrap())
    }

    #[tokio::test]
    async fn first_send_creates_a_session_and_renders_once() {
        let engine = test_engine().await;
        let user = UserId::new();

        let mut view = ChatView::open_latest(Arc::clone(&engine), user, SenderRole::EndUser)
            .await
            .unwrap();
        assert!(view.session().is_none());
        assert!(view.can_send());

        view.set_draft("Hello");
        view.send().await.unwrap();

        let session = view.session().unwrap().clone();
        assert_eq!(session.status, SessionStatus::Unread);
        assert_eq!(view.entries().len(), 1);
        assert_eq!(view.entries()[0].content, "Hello");
        assert!(!view.entries()[0].id.is_temp());
        assert!(view.draft().is_empty());
    }

    #[tokio::test]
    async fn ack_and_feed_echo_converge_to_one_entry() {
        let engine = test_engine().await;
        let user = UserId::new();

        let mut view = ChatView::open_latest(Arc::clone(&engine), user, SenderRole::EndUser)
            .await
            .unwrap();
        view.set_draft("Hello");
        view.send().await.unwrap();

        let session_id = view.session().unwrap().id;
        let mut subscription = engine.feed().subscribe_messages(session_id);

        view.set_draft("follow-up");
        view.send().await.unwrap();
        assert_eq!(view.entries().len(), 2);

        // The sender's own subscription echoes the insert; it must dedup.
        let event = subscription.try_recv().unwrap();
        assert_eq!(view.apply_message_event(&event), FeedOutcome::Duplicate);
        assert_eq!(view.entries().len(), 2);
    }

    #[tokio::test]
    async fn failed_send_rolls_back_and_restores_the_draft() {
        let engine = engine_with_failing_writes().await;
        let user = UserId::new();

        // The session itself persists fine; only message writes fail.
        let (session, _) = engine.create_session(user, "").await.unwrap();
        let mut view = ChatView::open_latest(Arc::clone(&engine), user, SenderRole::EndUser)
            .await
            .unwrap();
        assert_eq!(view.session().map(|s| s.id), Some(session.id));

        view.set_draft("will fail");
        let err = view.send().await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidConfig(_)));

        assert!(view.entries().is_empty());
        assert_eq!(view.draft(), "will fail");
    }

    #[tokio::test]
    async fn closed_sessions_reject_sends_without_writing() {
        let engine = test_engine().await;
        let user = UserId::new();

        let mut view = ChatView::open_latest(Arc::clone(&engine), user, SenderRole::EndUser)
            .await
            .unwrap();
        view.set_draft("Hello");
        view.send().await.unwrap();
        let session_id = view.session().unwrap().id;

        let mut session_feed = engine.feed().subscribe_session(session_id);
        engine.close(session_id).await.unwrap();
        while let Ok(event) = session_feed.try_recv() {
            view.apply_session_event(&event);
        }

        assert!(!view.can_send());
        let before = engine.messages(session_id).await.unwrap().len();

        view.set_draft("too late");
        let err = view.send().await.unwrap_err();
        assert!(matches!(err, ChatError::SessionClosed(id) if id == session_id));
        assert_eq!(view.draft(), "too late");
        assert_eq!(engine.messages(session_id).await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn close_and_restart_points_the_view_at_a_fresh_session() {
        let engine = test_engine().await;
        let user = UserId::new();

        let mut view = ChatView::open_latest(Arc::clone(&engine), user, SenderRole::EndUser)
            .await
            .unwrap();
        view.set_draft("Hello");
        view.send().await.unwrap();
        let old_id = view.session().unwrap().id;

        let mut session_feed = engine.feed().subscribe_session(old_id);
        engine.close(old_id).await.unwrap();
        while let Ok(event) = session_feed.try_recv() {
            view.apply_session_event(&event);
        }
        assert!(!view.can_send());

        let history = engine.messages(old_id).await.unwrap();
        assert_eq!(
            history.last().unwrap().message.content,
            SESSION_CLOSED_NOTICE
        );

        view.start_new_chat().await.unwrap();
        let new_id = view.session().unwrap().id;
        assert_ne!(new_id, old_id);
        assert!(view.can_send());
        assert!(view.entries().is_empty());
    }

    #[tokio::test]
    async fn second_tab_renders_a_sent_message_exactly_once() {
        let engine = test_engine().await;
        let user = UserId::new();

        let mut tab1 = ChatView::open_latest(Arc::clone(&engine), user, SenderRole::EndUser)
            .await
            .unwrap();
        tab1.set_draft("Hello");
        tab1.send().await.unwrap();
        let session_id = tab1.session().unwrap().id;

        let mut tab2 = ChatView::open_latest(Arc::clone(&engine), user, SenderRole::EndUser)
            .await
            .unwrap();
        let mut subscription = engine.feed().subscribe_messages(session_id);

        tab1.set_draft("from tab one");
        tab1.send().await.unwrap();

        let event = subscription.try_recv().unwrap();
        assert_eq!(tab2.apply_message_event(&event), FeedOutcome::Appended);
        // Duplicate delivery of the same event changes nothing.
        assert_eq!(tab2.apply_message_event(&event), FeedOutcome::Duplicate);

        let rendered: Vec<_> = tab2
            .entries()
            .iter()
            .filter(|entry| entry.content == "from tab one")
            .collect();
        assert_eq!(rendered.len(), 1);
        assert!(matches!(rendered[0].id, EntryId::Server(_)));
    }

    #[tokio::test]
    async fn admin_open_marks_unread_sessions_read() {
        let engine = test_engine().await;
        let user = UserId::new();
        let admin = UserId::new();

        let (session, _) = engine.create_session(user, "Hello").await.unwrap();
        assert_eq!(session.status, SessionStatus::Unread);

        let console = ChatView::open_session(
            Arc::clone(&engine),
            session.id,
            admin,
            SenderRole::Admin,
        )
        .await
        .unwrap();
        assert_eq!(console.session().unwrap().status, SessionStatus::Read);
    }
}

