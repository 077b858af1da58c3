//! Slack incoming-webhook adapter.

use serde_json::json;
use url::Url;

use crate::chat::core::errors::ChatResult;

/// Minimal client for a Slack incoming webhook.
pub struct SlackWebhook {
    client: reqwest::Client,
    url: Url,
}

impl SlackWebhook {
    /// Build a webhook client for the given URL.
    ///
    /// # Errors
    /// Returns an error if the URL is malformed or the HTTP client cannot be
    /// constructed.
    pub fn new(url: &str) -> ChatResult<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            url: Url::parse(url)?,
        })
    }

    /// Post a titled message with short fields.
    ///
    /// # Errors
    /// Returns an error if the request fails or Slack answers with a
    /// non-success status.
    pub async fn post(&self, title: &str, fields: &[(String, String)]) -> ChatResult<()> {
        let fields: Vec<_> = fields
            .iter()
            .map(|(title, value)| json!({ "title": title, "value": value, "short": true }))
            .collect();
        let payload = json!({
            "text": title,
            "attachments": [{ "fields": fields }],
        });

        self.client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_webhook_urls() {
        assert!(SlackWebhook::new("hooks.slack.com/services/T000").is_err());
        assert!(SlackWebhook::new("https://hooks.slack.com/services/T000/B000/XXX").is_ok());
    }
}
