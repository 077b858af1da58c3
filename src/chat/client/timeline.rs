//! In-memory message timeline with optimistic-entry reconciliation.
//!
//! Every chat UI instance renders from one [`Timeline`]. The same logical
//! message can reach it over two independent channels with no ordering
//! guarantee between them: the direct write acknowledgment and the realtime
//! change feed. Both paths go through here and both are idempotent, so the
//! message renders exactly once whichever arrives first, and the direct path
//! alone suffices when the feed drops an event.

use chrono::{DateTime, Utc};

use crate::chat::core::ids::{MessageId, TempId};
use crate::chat::core::message::{ChatMessage, MessageWithSender, Sender, SenderProfile};
use crate::chat::feed::event::ChangeEvent;

/// Identity of a timeline entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryId {
    /// Server-assigned identity of a persisted row.
    Server(MessageId),
    /// Client-local identity of an optimistic entry awaiting its row.
    Temp(TempId),
}

impl EntryId {
    /// Whether this entry is still optimistic.
    #[must_use]
    pub const fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    /// The server identity, once assigned.
    #[must_use]
    pub const fn server_id(&self) -> Option<MessageId> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Temp(_) => None,
        }
    }
}

/// One rendered message.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineEntry {
    /// Entry identity (server row or optimistic temp).
    pub id: EntryId,
    /// Author.
    pub sender: Sender,
    /// Text content.
    pub content: String,
    /// Ordering timestamp (local clock until the row is acknowledged).
    pub created_at: DateTime<Utc>,
    /// Sender display profile, when one is attached.
    pub profile: Option<SenderProfile>,
}

/// What a feed event did to the timeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeedOutcome {
    /// Insert for a server id already rendered; dropped.
    Duplicate,
    /// Insert matched an unresolved optimistic entry and replaced it.
    Reconciled,
    /// Insert appended a message this client had not seen.
    Appended,
    /// Update replaced an existing row in place.
    Updated,
    /// Update for an unknown row; dropped.
    Ignored,
}

/// Ordered, deduplicated message list for one session.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the timeline with stored history.
    pub fn load(&mut self, history: Vec<MessageWithSender>) {
        self.entries = history
            .into_iter()
            .map(|item| TimelineEntry {
                id: EntryId::Server(item.message.id),
                sender: item.message.sender,
                content: item.message.content,
                created_at: item.message.created_at,
                profile: item.sender,
            })
            .collect();
        self.entries.sort_by_key(|entry| entry.created_at);
    }

    /// Rendered entries, ordered by `created_at` ascending.
    #[must_use]
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Number of rendered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is rendered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a persisted row is already rendered.
    #[must_use]
    pub fn contains_server_id(&self, id: MessageId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.id.server_id() == Some(id))
    }

    /// Append an optimistic entry for a message being sent right now.
    pub fn push_optimistic(
        &mut self,
        temp_id: TempId,
        sender: Sender,
        content: impl Into<String>,
        now: DateTime<Utc>,
        profile: Option<SenderProfile>,
    ) {
        let entry = TimelineEntry {
            id: EntryId::Temp(temp_id),
            sender,
            content: content.into(),
            created_at: now,
            profile,
        };
        let position = self.insert_position(entry.created_at);
        self.entries.insert(position, entry);
    }

    /// Reconcile an acknowledged row with its optimistic entry.
    ///
    /// Finds the oldest unresolved temp entry matching the row's
    /// `(content, sender)` and overwrites it with the authoritative fields,
    /// preserving any locally attached profile. Returns the temp id it
    /// replaced, or `None` when nothing matched (e.g. the feed already
    /// reconciled it).
    pub fn resolve_temp(&mut self, row: &ChatMessage) -> Option<TempId> {
        if self.contains_server_id(row.id) {
            return None;
        }

        // Two identical in-flight sends match ambiguously; the oldest temp
        // entry wins (FIFO).
        let (index, temp_id) = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry.id {
                EntryId::Temp(temp_id)
                    if entry.content == row.content && entry.sender == row.sender =>
                {
                    Some((index, temp_id))
                }
                _ => None,
            })
            .min_by_key(|(_, temp_id)| *temp_id)?;

        let mut entry = self.entries.remove(index);
        entry.id = EntryId::Server(row.id);
        entry.created_at = row.created_at;
        let position = self.insert_position(entry.created_at);
        self.entries.insert(position, entry);
        Some(temp_id)
    }

    /// Roll back an optimistic entry whose write failed.
    ///
    /// Returns the entry's content so the compose input can be repopulated.
    pub fn remove_temp(&mut self, temp_id: TempId) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == EntryId::Temp(temp_id))?;
        Some(self.entries.remove(index).content)
    }

    /// Apply a realtime feed event.
    ///
    /// `profile` is attached to newly appended entries (the feed payload
    /// carries no join data).
    pub fn apply_event(
        &mut self,
        event: &ChangeEvent<ChatMessage>,
        profile: Option<SenderProfile>,
    ) -> FeedOutcome {
        match event {
            ChangeEvent::Inserted { new } => {
                if self.contains_server_id(new.id) {
                    return FeedOutcome::Duplicate;
                }
                if self.resolve_temp(new).is_some() {
                    return FeedOutcome::Reconciled;
                }

                let position = self.insert_position(new.created_at);
                self.entries.insert(
                    position,
                    TimelineEntry {
                        id: EntryId::Server(new.id),
                        sender: new.sender,
                        content: new.content.clone(),
                        created_at: new.created_at,
                        profile,
                    },
                );
                FeedOutcome::Appended
            }
            ChangeEvent::Updated { new, .. } => {
                let Some(index) = self
                    .entries
                    .iter()
                    .position(|entry| entry.id.server_id() == Some(new.id))
                else {
                    return FeedOutcome::Ignored;
                };

                let entry = &mut self.entries[index];
                entry.sender = new.sender;
                entry.content = new.content.clone();
                entry.created_at = new.created_at;
                self.entries.sort_by_key(|entry| entry.created_at);
                FeedOutcome::Updated
            }
        }
    }

    /// Backfill a profile onto rendered entries from `sender`.
    pub fn attach_profile(&mut self, profile: &SenderProfile) {
        for entry in &mut self.entries {
            if entry.sender == Sender::User(profile.id) && entry.profile.is_none() {
                entry.profile = Some(profile.clone());
            }
        }
    }

    /// Insertion index keeping `created_at` ascending with stable arrival
    /// order for ties.
    fn insert_position(&self, created_at: DateTime<Utc>) -> usize {
        self.entries
            .partition_point(|entry| entry.created_at <= created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::ids::{SessionId, UserId};
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).single().unwrap()
    }

    fn row(session_id: SessionId, sender: Sender, content: &str, millis: i64) -> ChatMessage {
        ChatMessage {
            id: crate::chat::core::ids::MessageId::new(),
            session_id,
            sender,
            content: content.to_string(),
            created_at: at(millis),
        }
    }

    #[test]
    fn duplicate_inserts_render_once() {
        let session = SessionId::new();
        let sender = Sender::User(UserId::new());
        let mut timeline = Timeline::new();

        let message = row(session, sender, "hello", 1_000);
        let event = ChangeEvent::Inserted {
            new: message.clone(),
        };
        assert_eq!(timeline.apply_event(&event, None), FeedOutcome::Appended);
        assert_eq!(timeline.apply_event(&event, None), FeedOutcome::Duplicate);
        assert_eq!(timeline.apply_event(&event, None), FeedOutcome::Duplicate);

        assert_eq!(timeline.len(), 1);
        assert_eq!(
            timeline.entries()[0].id,
            EntryId::Server(message.id)
        );
    }

    #[test]
    fn ack_then_feed_converges_to_one_entry() {
        let session = SessionId::new();
        let sender = Sender::User(UserId::new());
        let mut timeline = Timeline::new();

        let temp = TempId::from_seq(0);
        timeline.push_optimistic(temp, sender, "hello", at(900), None);

        let message = row(session, sender, "hello", 1_000);
        assert_eq!(timeline.resolve_temp(&message), Some(temp));
        assert_eq!(
            timeline.apply_event(&ChangeEvent::Inserted { new: message.clone() }, None),
            FeedOutcome::Duplicate
        );

        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.entries()[0].created_at, message.created_at);
    }

    #[test]
    fn feed_then_ack_converges_to_one_entry() {
        let session = SessionId::new();
        let sender = Sender::User(UserId::new());
        let mut timeline = Timeline::new();

        let temp = TempId::from_seq(0);
        timeline.push_optimistic(temp, sender, "hello", at(900), None);

        let message = row(session, sender, "hello", 1_000);
        assert_eq!(
            timeline.apply_event(&ChangeEvent::Inserted { new: message.clone() }, None),
            FeedOutcome::Reconciled
        );
        // The direct response lands afterwards and finds nothing to do.
        assert_eq!(timeline.resolve_temp(&message), None);

        assert_eq!(timeline.len(), 1);
        assert!(!timeline.entries()[0].id.is_temp());
    }

    #[test]
    fn reconciliation_preserves_attached_profile() {
        let session = SessionId::new();
        let user = UserId::new();
        let sender = Sender::User(user);
        let profile = SenderProfile {
            id: user,
            email: "mika@example.com".to_string(),
            first_name: None,
            last_name: None,
            avatar_url: None,
        };
        let mut timeline = Timeline::new();

        let temp = TempId::from_seq(0);
        timeline.push_optimistic(temp, sender, "hello", at(900), Some(profile.clone()));
        let message = row(session, sender, "hello", 1_000);
        timeline.resolve_temp(&message);

        assert_eq!(timeline.entries()[0].profile.as_ref(), Some(&profile));
    }

    #[test]
    fn identical_inflight_sends_resolve_fifo() {
        let session = SessionId::new();
        let sender = Sender::User(UserId::new());
        let mut timeline = Timeline::new();

        let first = TempId::from_seq(0);
        let second = TempId::from_seq(1);
        timeline.push_optimistic(first, sender, "ok", at(900), None);
        timeline.push_optimistic(second, sender, "ok", at(901), None);

        let message = row(session, sender, "ok", 1_000);
        assert_eq!(timeline.resolve_temp(&message), Some(first));
        let message = row(session, sender, "ok", 1_001);
        assert_eq!(timeline.resolve_temp(&message), Some(second));
    }

    #[test]
    fn rollback_returns_content_and_removes_entry() {
        let sender = Sender::User(UserId::new());
        let mut timeline = Timeline::new();

        let temp = TempId::from_seq(0);
        timeline.push_optimistic(temp, sender, "will fail", at(900), None);

        assert_eq!(timeline.remove_temp(temp), Some("will fail".to_string()));
        assert!(timeline.is_empty());
        assert_eq!(timeline.remove_temp(temp), None);
    }

    #[test]
    fn entries_stay_ordered_by_created_at() {
        let session = SessionId::new();
        let sender = Sender::User(UserId::new());
        let mut timeline = Timeline::new();

        for millis in [3_000, 1_000, 2_000] {
            let event = ChangeEvent::Inserted {
                new: row(session, sender, &format!("m{millis}"), millis),
            };
            timeline.apply_event(&event, None);
        }

        let contents: Vec<&str> = timeline
            .entries()
            .iter()
            .map(|entry| entry.content.as_str())
            .collect();
        assert_eq!(contents, vec!["m1000", "m2000", "m3000"]);
    }

    #[test]
    fn updates_replace_by_server_id_only() {
        let session = SessionId::new();
        let sender = Sender::User(UserId::new());
        let mut timeline = Timeline::new();

        let message = row(session, sender, "before", 1_000);
        timeline.apply_event(&ChangeEvent::Inserted { new: message.clone() }, None);

        let mut updated = message.clone();
        updated.content = "after".to_string();
        let outcome = timeline.apply_event(
            &ChangeEvent::Updated {
                new: updated,
                old: Some(message),
            },
            None,
        );
        assert_eq!(outcome, FeedOutcome::Updated);
        assert_eq!(timeline.entries()[0].content, "after");

        let unknown = row(session, sender, "ghost", 2_000);
        let outcome = timeline.apply_event(
            &ChangeEvent::Updated {
                new: unknown,
                old: None,
            },
            None,
        );
        assert_eq!(outcome, FeedOutcome::Ignored);
        assert_eq!(timeline.len(), 1);
    }
}
