// src/notify/mod.rs
//! Delivery sink contract and the retry-once policy around it.

pub mod feishu;
pub mod log;
pub mod slack;

use crate::error::DeliveryError;
use crate::ingest::types::NormalizedRecord;
use metrics::counter;
use std::time::Duration;

pub use feishu::FeishuWebhook;
pub use log::LogSink;
pub use slack::SlackWebhook;

/// What a sink is asked to deliver: the ranked selection, or an explicit
/// "nothing new" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Digest<'a> {
    Top(&'a [NormalizedRecord]),
    NothingNew,
}

impl<'a> Digest<'a> {
    pub fn from_selection(selection: &'a [NormalizedRecord]) -> Self {
        if selection.is_empty() {
            Self::NothingNew
        } else {
            Self::Top(selection)
        }
    }

    pub fn records(&self) -> &'a [NormalizedRecord] {
        match self {
            Self::Top(r) => r,
            Self::NothingNew => &[],
        }
    }
}

/// Outbound transport. The envelope is the sink's business; the pipeline
/// only needs ordered records in and success out.
#[async_trait::async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, digest: &Digest<'_>) -> Result<(), DeliveryError>;
    fn name(&self) -> &str;
}

/// Per-attempt timeouts. There is exactly one retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub first_timeout: Duration,
    pub retry_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            first_timeout: Duration::from_secs(10),
            retry_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u8 },
    Failed { attempts: u8, error: DeliveryError },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

async fn attempt(
    sink: &dyn DeliverySink,
    digest: &Digest<'_>,
    timeout: Duration,
) -> Result<(), DeliveryError> {
    counter!("radar_delivery_attempts_total", "sink" => sink.name().to_string()).increment(1);
    match tokio::time::timeout(timeout, sink.deliver(digest)).await {
        Ok(res) => res,
        Err(_) => Err(DeliveryError::Timeout(timeout)),
    }
}

/// Deliver once; on a transient error deliver the same digest one more time.
/// A rejection is final on the first attempt.
pub async fn deliver_with_retry(
    sink: &dyn DeliverySink,
    digest: &Digest<'_>,
    policy: &RetryPolicy,
) -> DeliveryOutcome {
    match attempt(sink, digest, policy.first_timeout).await {
        Ok(()) => return DeliveryOutcome::Delivered { attempts: 1 },
        Err(e) if e.is_transient() => {
            tracing::warn!(sink = sink.name(), error = %e, "delivery failed, retrying once");
        }
        Err(e) => {
            tracing::error!(sink = sink.name(), error = %e, "delivery rejected");
            return DeliveryOutcome::Failed {
                attempts: 1,
                error: e,
            };
        }
    }

    match attempt(sink, digest, policy.retry_timeout).await {
        Ok(()) => {
            tracing::info!(sink = sink.name(), "delivered on retry");
            DeliveryOutcome::Delivered { attempts: 2 }
        }
        Err(e) => {
            tracing::error!(sink = sink.name(), error = %e, "delivery failed after retry");
            DeliveryOutcome::Failed {
                attempts: 2,
                error: e,
            }
        }
    }
}

/// Plain-text rendering shared by the text sinks.
pub fn render_lines(digest: &Digest<'_>) -> Vec<String> {
    match digest {
        Digest::NothingNew => vec!["📭 No notable AI news in the past hour.".to_string()],
        Digest::Top(records) => records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "{}. {}\n   📰 {} | 🔥 {}\n   🔗 {}",
                    i + 1,
                    r.title,
                    r.source_name,
                    r.score,
                    r.link
                )
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_is_nothing_new() {
        assert_eq!(Digest::from_selection(&[]), Digest::NothingNew);
        assert!(Digest::NothingNew.records().is_empty());
    }

    #[test]
    fn nothing_new_renders_a_single_line() {
        let lines = render_lines(&Digest::NothingNew);
        assert_eq!(lines.len(), 1);
    }
}
