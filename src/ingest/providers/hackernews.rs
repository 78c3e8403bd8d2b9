// src/ingest/providers/hackernews.rs
//! Forum adapter over the public Hacker News item API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use crate::ingest::types::{NormalizedRecord, SourceKind, SourceProvider};
use crate::ingest::{normalize_drafts, KeywordFilter, MissingPublishedAt, RecordDraft};

pub const DEFAULT_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
pub const DEFAULT_TOP_LIMIT: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 8;

/// One item as served by `/item/<id>.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HnItem {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub score: Option<u64>,
}

impl HnItem {
    pub fn discussion_url(&self) -> String {
        format!("https://news.ycombinator.com/item?id={}", self.id)
    }
}

pub struct HackerNewsProvider {
    name: String,
    id_prefix: String,
    weight: i64,
    keywords: KeywordFilter,
    missing: MissingPublishedAt,
    top_limit: usize,
    concurrency: usize,
    mode: Mode,
}

enum Mode {
    Fixture(Vec<HnItem>),
    Http {
        api_base: String,
        client: reqwest::Client,
    },
}

impl HackerNewsProvider {
    pub fn from_api(
        name: impl Into<String>,
        api_base: impl Into<String>,
        weight: i64,
        keywords: KeywordFilter,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            id_prefix: "hn".into(),
            weight,
            keywords,
            missing: MissingPublishedAt::default(),
            top_limit: DEFAULT_TOP_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            mode: Mode::Http {
                api_base: api_base.into().trim_end_matches('/').to_string(),
                client,
            },
        }
    }

    /// Serve a fixed list of items in top-stories order.
    pub fn from_items(
        name: impl Into<String>,
        items: Vec<HnItem>,
        weight: i64,
        keywords: KeywordFilter,
    ) -> Self {
        Self {
            name: name.into(),
            id_prefix: "hn".into(),
            weight,
            keywords,
            missing: MissingPublishedAt::default(),
            top_limit: DEFAULT_TOP_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            mode: Mode::Fixture(items),
        }
    }

    pub fn with_top_limit(mut self, n: usize) -> Self {
        self.top_limit = n;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn with_missing_published(mut self, missing: MissingPublishedAt) -> Self {
        self.missing = missing;
        self
    }

    /// Keyword-gate the items and normalize the survivors, keeping input order.
    pub fn records_from_items(
        &self,
        items: Vec<HnItem>,
        collected_at: DateTime<Utc>,
    ) -> Vec<NormalizedRecord> {
        let drafts = items
            .into_iter()
            .filter(|it| {
                let title = it.title.as_deref().unwrap_or_default();
                let text = it.text.as_deref().unwrap_or_default();
                self.keywords.matches(&format!("{title} {text}"))
            })
            .map(|it| self.draft(it))
            .collect();
        normalize_drafts(drafts, collected_at, self.missing)
    }

    fn draft(&self, it: HnItem) -> RecordDraft {
        let link = match it.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => it.discussion_url(),
        };
        let points = it.score.unwrap_or(0);
        RecordDraft {
            id_prefix: self.id_prefix.clone(),
            source_name: self.name.clone(),
            kind: SourceKind::Forum,
            source_weight: self.weight,
            title: it.title.unwrap_or_default(),
            link,
            summary: format!("Score: {points} points"),
            id_seed: None,
            published_at: it.time.and_then(|t| DateTime::from_timestamp(t, 0)),
            popularity: it.score,
        }
    }

    async fn fetch_items(&self, api_base: &str, client: &reqwest::Client) -> Result<Vec<HnItem>> {
        let ids: Vec<u64> = client
            .get(format!("{api_base}/topstories.json"))
            .send()
            .await
            .context("topstories http get()")?
            .error_for_status()
            .context("topstories non-2xx")?
            .json()
            .await
            .context("topstories json")?;

        let lookups = ids.into_iter().take(self.top_limit).map(|id| async move {
            let res: Result<Option<HnItem>> = async {
                let item = client
                    .get(format!("{api_base}/item/{id}.json"))
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Option<HnItem>>()
                    .await?;
                Ok(item)
            }
            .await;
            (id, res)
        });

        // `buffered` keeps top-stories order while running lookups concurrently.
        let results: Vec<(u64, Result<Option<HnItem>>)> = stream::iter(lookups)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut items = Vec::with_capacity(results.len());
        for (id, res) in results {
            match res {
                Ok(Some(item)) => items.push(item),
                Ok(None) => tracing::debug!(source = %self.name, id, "item gone"),
                Err(e) => {
                    tracing::warn!(
                        source = %self.name,
                        id,
                        error = %e,
                        "item lookup failed, skipping"
                    )
                }
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl SourceProvider for HackerNewsProvider {
    async fn fetch_latest(&self) -> Result<Vec<NormalizedRecord>> {
        let collected_at = Utc::now();
        let items = match &self.mode {
            Mode::Fixture(items) => items.iter().take(self.top_limit).cloned().collect(),
            Mode::Http { api_base, client } => self.fetch_items(api_base, client).await?,
        };
        let scanned = items.len();
        let records = self.records_from_items(items, collected_at);
        tracing::debug!(source = %self.name, scanned, kept = records.len(), "stories filtered");
        Ok(records)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::providers::HN_KEYWORDS;
    use chrono::TimeZone;

    fn provider(items: Vec<HnItem>) -> HackerNewsProvider {
        HackerNewsProvider::from_items(
            "Hacker News",
            items,
            30,
            KeywordFilter::new(HN_KEYWORDS).unwrap(),
        )
    }

    fn item(id: u64, title: &str, url: Option<&str>) -> HnItem {
        HnItem {
            id,
            title: Some(title.into()),
            url: url.map(Into::into),
            text: None,
            time: Some(1_757_149_200),
            score: Some(321),
        }
    }

    #[test]
    fn keeps_ai_stories_only() {
        let p = provider(vec![]);
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 10, 0, 0).unwrap();
        let out = p.records_from_items(
            vec![
                item(1, "Show HN: a tiny LLM in Rust", Some("https://x.test/llm")),
                item(2, "The history of sailing", Some("https://x.test/sail")),
            ],
            now,
        );
        assert_eq!(out.len(), 1);
        let r = &out[0];
        assert_eq!(r.kind, SourceKind::Forum);
        assert_eq!(r.summary, "Score: 321 points");
        assert_eq!(r.popularity, Some(321));
        assert!(r.id.starts_with("hn_"));
        assert_eq!(r.published_at, DateTime::from_timestamp(1_757_149_200, 0));
    }

    #[test]
    fn ask_hn_links_to_discussion() {
        let p = provider(vec![]);
        let items = vec![item(42, "Ask HN: which AI editor?", None)];
        let out = p.records_from_items(items, Utc::now());
        assert_eq!(out[0].link, "https://news.ycombinator.com/item?id=42");
    }

    #[test]
    fn text_body_counts_for_keywords() {
        let p = provider(vec![]);
        let mut it = item(7, "Ask HN: what are you building?", None);
        it.text = Some("Mostly transformer tooling".into());
        assert_eq!(p.records_from_items(vec![it], Utc::now()).len(), 1);
    }

    #[test]
    fn item_json_shape() {
        let raw = r#"{"by":"pg","descendants":3,"id":8863,"kids":[1],"score":111,"time":1175714200,"title":"My YC app","type":"story","url":"http://www.getdropbox.com/u/2/screencast.html"}"#;
        let it: HnItem = serde_json::from_str(raw).unwrap();
        assert_eq!(it.id, 8863);
        assert_eq!(it.score, Some(111));
    }

    #[tokio::test]
    async fn fixture_mode_respects_top_limit() {
        let items = (0..10)
            .map(|i| item(i, &format!("AI story {i}"), Some(&format!("https://x.test/{i}"))))
            .collect();
        let p = provider(items).with_top_limit(3);
        let out = p.fetch_latest().await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].title, "AI story 0");
    }
}
