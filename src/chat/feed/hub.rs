//! In-process change-feed hub.
//!
//! Stands in for the managed pub/sub transport: the engine publishes row
//! changes here and every open chat UI (end-user tabs, admin console)
//! subscribes to the sessions it displays. One broadcast channel exists per
//! subscribed session and is torn down when its last subscriber goes away,
//! so reopening a session never accumulates leaked channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::chat::core::ids::SessionId;
use crate::chat::core::message::ChatMessage;
use crate::chat::core::session::ChatSession;
use crate::chat::feed::event::ChangeEvent;

type Channels<T> = Arc<DashMap<SessionId, broadcast::Sender<ChangeEvent<T>>>>;

/// Change-feed hub distributing message and session-row events per session.
pub struct FeedHub {
    capacity: usize,
    message_channels: Channels<ChatMessage>,
    session_channels: Channels<ChatSession>,
    subscription_seq: AtomicU64,
}

impl FeedHub {
    /// Create a hub whose channels buffer `capacity` events for slow
    /// subscribers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            message_channels: Arc::new(DashMap::new()),
            session_channels: Arc::new(DashMap::new()),
            subscription_seq: AtomicU64::new(0),
        }
    }

    /// Subscribe to message-row changes for one session.
    #[must_use]
    pub fn subscribe_messages(&self, session_id: SessionId) -> FeedSubscription<ChatMessage> {
        self.subscribe(&self.message_channels, "messages", session_id)
    }

    /// Subscribe to session-row changes for one session.
    #[must_use]
    pub fn subscribe_session(&self, session_id: SessionId) -> FeedSubscription<ChatSession> {
        self.subscribe(&self.session_channels, "chat_sessions", session_id)
    }

    /// Publish a message-row change to that session's subscribers, if any.
    pub fn publish_message(&self, event: ChangeEvent<ChatMessage>) {
        let session_id = event.new_row().session_id;
        Self::publish(&self.message_channels, session_id, event);
    }

    /// Publish a session-row change to that session's subscribers, if any.
    pub fn publish_session(&self, event: ChangeEvent<ChatSession>) {
        let session_id = event.new_row().id;
        Self::publish(&self.session_channels, session_id, event);
    }

    /// Number of sessions with at least one live message subscription.
    #[must_use]
    pub fn watched_session_count(&self) -> usize {
        self.message_channels.len()
    }

    fn subscribe<T: Clone>(
        &self,
        channels: &Channels<T>,
        scope: &str,
        session_id: SessionId,
    ) -> FeedSubscription<T> {
        let receiver = channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        let seq = self.subscription_seq.fetch_add(1, Ordering::Relaxed);
        // Unique per subscription, so rapid close/reopen of the same session
        // never collides on a channel name.
        let name = format!(
            "{scope}:{session_id}:{seq}-{}",
            Utc::now().timestamp_millis()
        );

        FeedSubscription {
            name,
            session_id,
            receiver,
            channels: Arc::clone(channels),
        }
    }

    fn publish<T: Clone>(channels: &Channels<T>, session_id: SessionId, event: ChangeEvent<T>) {
        if let Some(sender) = channels.get(&session_id) {
            // No subscribers is fine; the direct-response path still keeps
            // the sender's own view consistent.
            let _ = sender.send(event);
        }
    }
}

/// A live feed subscription scoped to one session.
///
/// Dropping it tears the underlying channel down once no other subscriber
/// for the same session remains.
pub struct FeedSubscription<T> {
    name: String,
    session_id: SessionId,
    receiver: broadcast::Receiver<ChangeEvent<T>>,
    channels: Channels<T>,
}

impl<T: Clone> FeedSubscription<T> {
    /// Uniquified channel name of this subscription.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session this subscription watches.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Wait for the next change event.
    ///
    /// # Errors
    /// Returns [`broadcast::error::RecvError::Lagged`] when this subscriber
    /// fell behind the channel buffer, or `Closed` once the channel is torn
    /// down.
    pub async fn recv(&mut self) -> Result<ChangeEvent<T>, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Drain an event if one is already queued.
    ///
    /// # Errors
    /// Returns [`broadcast::error::TryRecvError::Empty`] when nothing is
    /// queued, `Lagged` when this subscriber fell behind, or `Closed` once
    /// the channel is torn down.
    pub fn try_recv(&mut self) -> Result<ChangeEvent<T>, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

impl<T> Drop for FeedSubscription<T> {
    fn drop(&mut self) {
        // Our receiver is still alive here, so "last one out" means a count
        // of one.
        self.channels
            .remove_if(&self.session_id, |_, sender| sender.receiver_count() <= 1);
    }
}
