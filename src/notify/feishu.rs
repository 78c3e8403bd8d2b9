use reqwest::Client;
use serde_json::{json, Value};

use super::{DeliverySink, Digest};
use crate::error::DeliveryError;

pub const DEFAULT_TITLE: &str = "🤖 AI Hot Picks (hourly)";
pub const DEFAULT_FOOTER: &str = "—\n🤖 AI News Radar | updated every hour";

/// Feishu/Lark custom bot webhook.
#[derive(Clone)]
pub struct FeishuWebhook {
    webhook_url: String,
    client: Client,
    title: String,
    footer: String,
}

impl FeishuWebhook {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: Client::new(),
            title: DEFAULT_TITLE.to_string(),
            footer: DEFAULT_FOOTER.to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    /// `post` message envelope for the digest.
    pub fn build_message(&self, digest: &Digest<'_>) -> Value {
        let text = |t: String| json!({ "tag": "text", "text": t });

        let mut content: Vec<Value> = Vec::new();
        match digest {
            Digest::NothingNew => {
                content.push(text("📭 No notable AI news in the past hour\n\n".to_string()));
            }
            Digest::Top(records) => {
                content.push(text(format!("🔥 Top {} AI stories this hour\n\n", records.len())));
                for (i, r) in records.iter().enumerate() {
                    content.push(text(format!("{}. ", i + 1)));
                    content.push(json!({ "tag": "a", "text": r.title, "href": r.link }));
                    content.push(text("\n".to_string()));
                    content.push(text(format!(
                        "   📰 {}  |  🔥 Hotness: {}\n\n",
                        r.source_name, r.score
                    )));
                }
            }
        }
        content.push(text(self.footer.clone()));

        json!({
            "msg_type": "post",
            "content": {
                "post": {
                    "zh_cn": {
                        "title": self.title,
                        "content": [content],
                    }
                }
            }
        })
    }
}

/// Feishu answers 200 with `code != 0` when it refuses a message.
fn check_body(body: &str) -> Result<(), DeliveryError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| DeliveryError::Transient(format!("unreadable webhook response: {e}")))?;
    let code = v
        .get("code")
        .or_else(|| v.get("StatusCode"))
        .and_then(Value::as_i64);
    match code {
        Some(0) => Ok(()),
        _ => Err(DeliveryError::Rejected(body.trim().to_string())),
    }
}

#[async_trait::async_trait]
impl DeliverySink for FeishuWebhook {
    async fn deliver(&self, digest: &Digest<'_>) -> Result<(), DeliveryError> {
        let payload = self.build_message(digest);
        tracing::info!(records = digest.records().len(), "pushing message to Feishu");

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(DeliveryError::Transient(format!(
                "Feishu webhook returned {status}: {}",
                body.trim()
            )));
        }
        check_body(&body)
    }

    fn name(&self) -> &str {
        "feishu"
    }
}
