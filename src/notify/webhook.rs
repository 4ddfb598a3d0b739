use anyhow::{Context, Result};
use reqwest::Client;

use super::Notifier;
use crate::event::CanonicalEvent;

/// Posts kept events to a Slack-compatible webhook as `{"text": ...}`.
pub struct WebhookNotifier {
    webhook_url: Option<String>,
    client: Client,
}

impl WebhookNotifier {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok(),
            client: Client::new(),
        }
    }

    /// Optional builder for tests/tools
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: Some(url),
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &CanonicalEvent) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("webhook disabled (no NOTIFY_WEBHOOK_URL)");
            return Ok(());
        };

        let text = if event.body.is_empty() {
            format!("*{event}*")
        } else {
            format!("*{event}*\n{}", event.body)
        };
        let body = serde_json::json!({ "text": text });

        self.client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("webhook post")?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }
}
