//! Keyed rolling-window rate limiter for outbound notifications.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::chat::core::ids::UserId;

/// At most one pass per key per rolling window.
///
/// Process-local and in-memory: the throttle resets on restart, which is the
/// accepted behavior for this best-effort notification path.
pub struct RateLimiter {
    window: Duration,
    last_sent: DashMap<UserId, Instant>,
}

impl RateLimiter {
    /// Create a limiter with the given rolling window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: DashMap::new(),
        }
    }

    /// Whether a notification for `user_id` may go out now. A `true` answer
    /// consumes the window.
    #[must_use]
    pub fn allow(&self, user_id: UserId) -> bool {
        self.allow_at(user_id, Instant::now())
    }

    fn allow_at(&self, user_id: UserId, now: Instant) -> bool {
        match self.last_sent.entry(user_id) {
            Entry::Occupied(mut occupied) => {
                if now.duration_since(*occupied.get()) >= self.window {
                    occupied.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }
}
