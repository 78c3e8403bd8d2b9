// src/ingest/providers/rss.rs
//! Blog feed adapter (RSS 2.0, with an Atom fallback).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::{NormalizedRecord, SourceKind, SourceProvider};
use crate::ingest::{
    normalize_drafts, normalize_text, truncate_summary, MissingPublishedAt, RecordDraft,
};

const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Parse an RFC 2822 (RSS) or RFC 3339 (Atom) timestamp.
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    let odt = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok();
    match odt {
        Some(dt) => DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()),
        // chrono also understands legacy zone names such as "GMT" / "EST"
        None => DateTime::parse_from_rfc2822(ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

pub struct RssFeedProvider {
    name: String,
    id_prefix: String,
    weight: i64,
    missing: MissingPublishedAt,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedProvider {
    pub fn from_url(
        name: impl Into<String>,
        url: impl Into<String>,
        id_prefix: impl Into<String>,
        weight: i64,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            id_prefix: id_prefix.into(),
            weight,
            missing: MissingPublishedAt::default(),
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    /// Serve a fixed document instead of going to the network.
    pub fn from_fixture_str(
        name: impl Into<String>,
        xml: &str,
        id_prefix: impl Into<String>,
        weight: i64,
    ) -> Self {
        Self {
            name: name.into(),
            id_prefix: id_prefix.into(),
            weight,
            missing: MissingPublishedAt::default(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn with_missing_published(mut self, missing: MissingPublishedAt) -> Self {
        self.missing = missing;
        self
    }

    fn draft(
        &self,
        title: Option<String>,
        link: Option<String>,
        summary: Option<String>,
        published: Option<&str>,
    ) -> RecordDraft {
        let summary = normalize_text(summary.as_deref().unwrap_or_default());
        RecordDraft {
            id_prefix: self.id_prefix.clone(),
            source_name: self.name.clone(),
            kind: SourceKind::Blog,
            source_weight: self.weight,
            title: title.unwrap_or_default(),
            link: link.unwrap_or_default(),
            summary: truncate_summary(&summary, SUMMARY_CHARS),
            id_seed: None,
            published_at: published.and_then(parse_feed_date),
            popularity: None,
        }
    }

    /// Parse a feed document into records. Items without title or link are skipped.
    pub fn parse_feed(
        &self,
        xml: &str,
        collected_at: DateTime<Utc>,
    ) -> Result<Vec<NormalizedRecord>> {
        let xml_clean = scrub_html_entities_for_xml(xml);

        let drafts: Vec<RecordDraft> = match from_str::<Rss>(&xml_clean) {
            Ok(rss) => rss
                .channel
                .item
                .into_iter()
                .map(|it| self.draft(it.title, it.link, it.description, it.pub_date.as_deref()))
                .collect(),
            Err(rss_err) if !xml_clean.contains("<feed") => {
                return Err(anyhow!("not an RSS or Atom document: {rss_err}"))
                    .with_context(|| format!("parsing {} feed", self.name));
            }
            Err(rss_err) => {
                let atom: AtomFeed = from_str(&xml_clean)
                    .map_err(|atom_err| anyhow!("not RSS ({rss_err}) nor Atom ({atom_err})"))
                    .with_context(|| format!("parsing {} feed", self.name))?;
                atom.entry
                    .into_iter()
                    .map(|e| {
                        let link = pick_atom_link(&e.link);
                        let summary = e.summary.or(e.content).map(|t| t.value);
                        let published = e.published.or(e.updated);
                        self.draft(e.title.map(|t| t.value), link, summary, published.as_deref())
                    })
                    .collect()
            }
        };

        Ok(normalize_drafts(drafts, collected_at, self.missing))
    }
}

fn pick_atom_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
        .or_else(|| links.first())
        .and_then(|l| l.href.clone())
}

#[async_trait]
impl SourceProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<NormalizedRecord>> {
        let collected_at = Utc::now();
        let records = match &self.mode {
            Mode::Fixture(s) => self.parse_feed(s, collected_at)?,
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.name))?
                    .error_for_status()
                    .with_context(|| format!("{} non-2xx", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))?;
                self.parse_feed(&body, collected_at)?
            }
        };
        tracing::debug!(source = %self.name, records = records.len(), "feed parsed");
        Ok(records)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
