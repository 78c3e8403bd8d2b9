use super::{render_lines, DeliverySink, Digest};
use crate::error::DeliveryError;

/// Dry-run sink: renders the digest into the log and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait::async_trait]
impl DeliverySink for LogSink {
    async fn deliver(&self, digest: &Digest<'_>) -> Result<(), DeliveryError> {
        tracing::info!(records = digest.records().len(), "[DRY RUN] would push:");
        for line in render_lines(digest) {
            tracing::info!("{line}");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
