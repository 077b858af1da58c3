//! Fire-and-forget support notifications for qualifying messages.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::chat::core::config::NotifyConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::UserId;
use crate::chat::core::message::ChatMessage;
use crate::chat::notify::rate_limit::RateLimiter;
use crate::chat::notify::slack::SlackWebhook;

/// Longest message excerpt forwarded to the webhook.
const PREVIEW_CHARS: usize = 140;

/// Dispatches a Slack notification when an end-user message arrives,
/// throttled per sender.
///
/// Dispatch is fire-and-forget: the post runs on a spawned task and every
/// failure is swallowed with a log line, so notifications can never affect
/// message delivery or UI state.
pub struct NotificationDispatcher {
    webhook: Arc<SlackWebhook>,
    limiter: RateLimiter,
}

impl NotificationDispatcher {
    /// Build a dispatcher from an adapter and an injected limiter.
    #[must_use]
    pub fn new(webhook: SlackWebhook, limiter: RateLimiter) -> Self {
        Self {
            webhook: Arc::new(webhook),
            limiter,
        }
    }

    /// Build from configuration. Returns `None` when no webhook URL is
    /// configured (dispatch disabled).
    ///
    /// # Errors
    /// Returns an error if the webhook URL is malformed.
    pub fn from_config(config: &NotifyConfig) -> ChatResult<Option<Self>> {
        let Some(url) = &config.webhook_url else {
            return Ok(None);
        };
        let webhook = SlackWebhook::new(url)?;
        let limiter = RateLimiter::new(Duration::from_secs(config.window_seconds));
        Ok(Some(Self::new(webhook, limiter)))
    }

    /// Notify support of a new end-user message, unless the sender is still
    /// inside the throttle window.
    pub fn dispatch(&self, sender: UserId, message: &ChatMessage) {
        if !self.limiter.allow(sender) {
            debug!(%sender, "notification throttled");
            return;
        }

        let webhook = Arc::clone(&self.webhook);
        let fields = vec![
            ("user".to_string(), sender.to_string()),
            ("session".to_string(), message.session_id.to_string()),
            ("message".to_string(), preview(&message.content)),
        ];
        drop(tokio::spawn(async move {
            if let Err(err) = webhook.post("New support chat message", &fields).await {
                warn!(?err, "notification dispatch failed");
            }
        }));
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let mut excerpt: String = content.chars().take(PREVIEW_CHARS).collect();
    excerpt.push('…');
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_a_webhook_url() {
        let config = NotifyConfig::default();
        assert!(NotificationDispatcher::from_config(&config)
            .unwrap()
            .is_none());

        let config = NotifyConfig {
            webhook_url: Some("https://hooks.slack.com/services/T000/B000/XXX".to_string()),
            window_seconds: 3600,
        };
        assert!(NotificationDispatcher::from_config(&config)
            .unwrap()
            .is_some());
    }

    #[test]
    fn previews_are_bounded() {
        let short = "hello";
        assert_eq!(preview(short), "hello");

        let long = "x".repeat(PREVIEW_CHARS * 2);
        let excerpt = preview(&long);
        assert_eq!(excerpt.chars().count(), PREVIEW_CHARS + 1);
        assert!(excerpt.ends_with('…'));
    }
}
