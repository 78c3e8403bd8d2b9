use reqwest::Client;

use super::{render_lines, DeliverySink, Digest};
use crate::error::DeliveryError;

/// Slack incoming webhook, plain `text` payload.
pub struct SlackWebhook {
    webhook_url: String,
    client: Client,
    title: String,
}

impl SlackWebhook {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: Client::new(),
            title: "*AI Hot Picks (hourly)*".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn build_text(&self, digest: &Digest<'_>) -> String {
        let mut lines = vec![self.title.clone()];
        lines.extend(render_lines(digest));
        lines.join("\n")
    }
}

#[async_trait::async_trait]
impl DeliverySink for SlackWebhook {
    async fn deliver(&self, digest: &Digest<'_>) -> Result<(), DeliveryError> {
        let body = serde_json::json!({
            "text": self.build_text(digest),
            "unfurl_links": false,
        });

        let resp = self.client.post(&self.webhook_url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "Slack webhook returned non-success");
            return Err(DeliveryError::Transient(format!("Slack webhook returned {status}")));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "slack"
    }
}
