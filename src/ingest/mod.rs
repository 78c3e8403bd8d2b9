// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::error::{MalformedRecord, SourceFailure};
use crate::ingest::types::{NormalizedRecord, SourceKind, SourceProvider};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, histogram};
use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Max chars kept from any normalized text field.
const MAX_TEXT_CHARS: usize = 1500;

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Cut to `max` chars and append `...` when something was cut.
pub fn truncate_summary(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    } else {
        s.to_string()
    }
}

/// Deterministic record id: `<prefix>_<first 12 hex chars of sha256(seed)>`.
pub fn record_id(prefix: &str, seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let mut out = String::with_capacity(prefix.len() + 13);
    out.push_str(prefix);
    out.push('_');
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Intra-run dedup key for a link. `None` for an empty link.
pub fn canonical_link(link: &str) -> Option<String> {
    let t = link.trim();
    if t.is_empty() {
        return None;
    }
    match url::Url::parse(t) {
        Ok(mut u) => {
            u.set_fragment(None);
            let path = u.path().trim_end_matches('/').to_string();
            if path.is_empty() {
                u.set_path("/");
            } else {
                u.set_path(&path);
            }
            Some(u.to_string().trim_end_matches('/').to_string())
        }
        Err(_) => Some(t.trim_end_matches('/').to_string()),
    }
}

/// What an adapter does when the upstream gives no publish time.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingPublishedAt {
    /// Leave it unknown; the scorer gives no recency bonus.
    #[default]
    Unknown,
    /// Substitute the fetch time.
    FetchTime,
}

/// Case-insensitive keyword gate. A keyword has to start at a word boundary,
/// so "ai" matches "AI agents" but not "said".
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    re: Option<Regex>,
}

impl KeywordFilter {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> anyhow::Result<Self> {
        let alts: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if alts.is_empty() {
            return Ok(Self { re: None });
        }
        let re = Regex::new(&format!(r"(?i)\b(?:{})", alts.join("|")))?;
        Ok(Self { re: Some(re) })
    }

    /// An empty keyword list lets everything through.
    pub fn matches(&self, text: &str) -> bool {
        match &self.re {
            Some(re) => re.is_match(text),
            None => true,
        }
    }
}

/// Raw item as an adapter sees it, before the normalization contract is applied.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub id_prefix: String,
    pub source_name: String,
    pub kind: SourceKind,
    pub source_weight: i64,
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Hashed into the id instead of `title + link` when set.
    pub id_seed: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub popularity: Option<u64>,
}

impl RecordDraft {
    pub fn normalize(
        self,
        collected_at: DateTime<Utc>,
        missing: MissingPublishedAt,
    ) -> Result<NormalizedRecord, MalformedRecord> {
        let title = normalize_text(&self.title);
        let link = self.link.trim().to_string();
        if title.is_empty() || link.is_empty() {
            return Err(MalformedRecord {
                source_name: self.source_name,
                reason: format!("missing title or link (title={:?}, link={:?})", title, link),
            });
        }

        let seed = self
            .id_seed
            .unwrap_or_else(|| format!("{}{}", title, link));
        let published_at = match (self.published_at, missing) {
            (Some(ts), _) => Some(ts),
            (None, MissingPublishedAt::Unknown) => None,
            (None, MissingPublishedAt::FetchTime) => Some(collected_at),
        };

        Ok(NormalizedRecord {
            id: record_id(&self.id_prefix, &seed),
            title,
            summary: normalize_text(&self.summary),
            link,
            source_name: self.source_name,
            kind: self.kind,
            published_at,
            collected_at,
            source_weight: self.source_weight,
            score: 0,
            popularity: self.popularity,
        })
    }
}

/// Normalize a batch of drafts, skipping (and counting) malformed ones.
pub fn normalize_drafts(
    drafts: Vec<RecordDraft>,
    collected_at: DateTime<Utc>,
    missing: MissingPublishedAt,
) -> Vec<NormalizedRecord> {
    let mut out = Vec::with_capacity(drafts.len());
    for d in drafts {
        match d.normalize(collected_at, missing) {
            Ok(rec) => out.push(rec),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed record");
                counter!("radar_malformed_records_total", "source" => e.source_name.clone())
                    .increment(1);
            }
        }
    }
    out
}

/// Output of one aggregation pass.
#[derive(Debug, Default)]
pub struct Aggregated {
    pub records: Vec<NormalizedRecord>,
    pub failures: Vec<SourceFailure>,
}

/// Fetch every provider concurrently, each under its own timeout.
/// A failing or timed-out provider contributes nothing and is reported as a
/// soft failure. Records keep their per-provider order; providers are
/// concatenated in slice order.
pub async fn aggregate(
    providers: &[Box<dyn SourceProvider>],
    per_call_timeout: Duration,
) -> Aggregated {
    crate::metrics::ensure_described();

    let fetches = providers.iter().map(|p| async move {
        let t0 = Instant::now();
        let res = tokio::time::timeout(per_call_timeout, p.fetch_latest()).await;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("radar_fetch_ms", "source" => p.name().to_string()).record(ms);
        (p.name().to_string(), res)
    });

    let mut out = Aggregated::default();
    for (name, res) in join_all(fetches).await {
        let reason = match res {
            Ok(Ok(mut records)) => {
                tracing::info!(source = %name, fetched = records.len(), "source fetched");
                counter!("radar_records_fetched_total", "source" => name.clone())
                    .increment(records.len() as u64);
                out.records.append(&mut records);
                continue;
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => format!("timed out after {}s", per_call_timeout.as_secs_f64()),
        };
        tracing::warn!(source = %name, %reason, "source failed, continuing without it");
        counter!("radar_source_errors_total", "source" => name.clone()).increment(1);
        out.failures.push(SourceFailure {
            source: name,
            reason,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(title: &str, link: &str) -> RecordDraft {
        RecordDraft {
            id_prefix: "openai".into(),
            source_name: "OpenAI Blog".into(),
            kind: SourceKind::Blog,
            source_weight: 50,
            title: title.into(),
            link: link.into(),
            summary: String::new(),
            id_seed: None,
            published_at: None,
            popularity: None,
        }
    }

    #[test]
    fn normalize_text_decodes_and_collapses() {
        let s = "  <b>Hello,&nbsp;&nbsp; world</b>  &ldquo;ok&rdquo; ";
        assert_eq!(normalize_text(s), r#"Hello, world "ok""#);
    }

    #[test]
    fn truncate_appends_ellipsis_only_when_cut() {
        assert_eq!(truncate_summary("abcdef", 3), "abc...");
        assert_eq!(truncate_summary("abc", 3), "abc");
    }

    #[test]
    fn record_id_is_stable_and_prefixed() {
        let a = record_id("hn", "Title https://x.test");
        let b = record_id("hn", "Title https://x.test");
        let c = record_id("hn", "Other https://x.test");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("hn_"));
        assert_eq!(a.len(), "hn_".len() + 12);
    }

    #[test]
    fn canonical_link_drops_fragment_and_trailing_slash() {
        assert_eq!(
            canonical_link("https://example.com/post/#comments"),
            canonical_link("https://EXAMPLE.com/post")
        );
        assert_eq!(canonical_link("   "), None);
        assert_eq!(canonical_link("not a url/"), Some("not a url".to_string()));
    }

    #[test]
    fn keyword_filter_needs_word_start() {
        let f = KeywordFilter::new(&["AI", "LLM"]).unwrap();
        assert!(f.matches("New AI agents"));
        assert!(f.matches("llms are everywhere"));
        assert!(!f.matches("He said nothing"));
        assert!(KeywordFilter::new::<&str>(&[]).unwrap().matches("anything"));
    }

    #[test]
    fn draft_without_link_is_malformed() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let err = draft("Title", "  ")
            .normalize(now, MissingPublishedAt::Unknown)
            .unwrap_err();
        assert_eq!(err.source_name, "OpenAI Blog");
    }

    #[test]
    fn missing_publish_time_policy() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let unknown = draft("T", "https://a.test")
            .normalize(now, MissingPublishedAt::Unknown)
            .unwrap();
        assert_eq!(unknown.published_at, None);
        let fetched = draft("T", "https://a.test")
            .normalize(now, MissingPublishedAt::FetchTime)
            .unwrap();
        assert_eq!(fetched.published_at, Some(now));
        assert_eq!(unknown.id, fetched.id);
        assert_eq!(unknown.score, 0);
    }

    #[test]
    fn normalize_drafts_skips_malformed() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let out = normalize_drafts(
            vec![draft("A", "https://a.test"), draft("", "https://b.test")],
            now,
            MissingPublishedAt::Unknown,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "A");
    }
}
