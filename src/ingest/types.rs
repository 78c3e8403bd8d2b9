// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of an upstream source. The scorer dispatches its default
/// popularity bonus on this tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Blog,
    Forum,
    Trending,
}

/// The common record shape every adapter emits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub id: String, // "<prefix>_<hex12>", stable across runs
    pub title: String,
    pub summary: String,
    pub link: String,
    pub source_name: String, // e.g. "Hacker News"
    pub kind: SourceKind,
    /// `None` means the upstream publish time is unknown.
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub source_weight: i64,
    /// Hotness, set by the scorer.
    pub score: i64,
    /// Upstream popularity count (HN points, stars today), if the source has one.
    pub popularity: Option<u64>,
}

/// Source adapter contract: one upstream, one batch of records per call.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<NormalizedRecord>>;
    fn name(&self) -> &str;
}
