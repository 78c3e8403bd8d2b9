// src/ingest/providers/github_trending.rs
//! Trending adapter: scrapes the daily trending page for several language tabs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use crate::ingest::types::{NormalizedRecord, SourceKind, SourceProvider};
use crate::ingest::{
    normalize_drafts, normalize_text, truncate_summary, KeywordFilter, MissingPublishedAt,
    RecordDraft,
};

pub const DEFAULT_BASE_URL: &str = "https://github.com/trending";
pub const DEFAULT_MAX_ITEMS: usize = 20;
const SUMMARY_CHARS: usize = 150;

/// Language tabs; `""` is the all-languages page.
pub const DEFAULT_TABS: &[&str] = &["", "python", "javascript", "typescript", "jupyter notebook"];

static ROW: Lazy<Selector> = Lazy::new(|| sel("article.Box-row"));
static REPO_LINK: Lazy<Selector> = Lazy::new(|| sel("h2 a"));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| sel("p.col-9"));
static STARS_TODAY: Lazy<Selector> = Lazy::new(|| sel("span.d-inline-block.float-sm-right"));

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("static selector")
}

/// One repository row as scraped from a trending page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingRepo {
    /// `owner/repo`
    pub path: String,
    pub url: String,
    pub description: String,
    /// Raw text, e.g. `"1,234 stars today"`.
    pub stars_text: String,
    pub stars_today: Option<u64>,
}

fn text_of(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Leading integer of a "1,234 stars today" label.
pub fn parse_star_count(s: &str) -> Option<u64> {
    let digits: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Scrape repository rows. Rows without a repository link are skipped.
pub fn parse_trending_html(html: &str) -> Vec<TrendingRepo> {
    let doc = Html::parse_document(html);
    doc.select(&ROW)
        .filter_map(|row| {
            let href = row.select(&REPO_LINK).next()?.value().attr("href")?;
            let path = href.trim().trim_matches('/').to_string();
            if path.is_empty() {
                return None;
            }
            let description = row.select(&DESCRIPTION).next().map(text_of).unwrap_or_default();
            let stars_text = row.select(&STARS_TODAY).next().map(text_of).unwrap_or_default();
            Some(TrendingRepo {
                url: format!("https://github.com/{path}"),
                stars_today: parse_star_count(&stars_text),
                path,
                description,
                stars_text,
            })
        })
        .collect()
}

/// Page URL for a language tab.
pub fn tab_url(base: &str, tab: &str) -> String {
    let base = base.trim_end_matches('/');
    let tab = tab.trim().to_lowercase().replace(' ', "-");
    if tab.is_empty() {
        format!("{base}?since=daily")
    } else {
        format!("{base}/{tab}?since=daily")
    }
}

pub struct GithubTrendingProvider {
    name: String,
    id_prefix: String,
    weight: i64,
    keywords: KeywordFilter,
    missing: MissingPublishedAt,
    max_items: usize,
    mode: Mode,
}

enum Mode {
    /// One HTML document per tab.
    Fixture(Vec<String>),
    Http {
        base_url: String,
        tabs: Vec<String>,
        client: reqwest::Client,
    },
}

impl GithubTrendingProvider {
    pub fn from_url(
        name: impl Into<String>,
        base_url: impl Into<String>,
        tabs: Vec<String>,
        weight: i64,
        keywords: KeywordFilter,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            id_prefix: "github".into(),
            weight,
            keywords,
            missing: MissingPublishedAt::default(),
            max_items: DEFAULT_MAX_ITEMS,
            mode: Mode::Http {
                base_url: base_url.into(),
                tabs,
                client,
            },
        }
    }

    pub fn from_fixture_pages(
        name: impl Into<String>,
        pages: Vec<String>,
        weight: i64,
        keywords: KeywordFilter,
    ) -> Self {
        Self {
            name: name.into(),
            id_prefix: "github".into(),
            weight,
            keywords,
            missing: MissingPublishedAt::default(),
            max_items: DEFAULT_MAX_ITEMS,
            mode: Mode::Fixture(pages),
        }
    }

    pub fn with_max_items(mut self, n: usize) -> Self {
        self.max_items = n;
        self
    }

    pub fn with_missing_published(mut self, missing: MissingPublishedAt) -> Self {
        self.missing = missing;
        self
    }

    fn draft(&self, repo: TrendingRepo) -> RecordDraft {
        let mut summary = truncate_summary(&repo.description, SUMMARY_CHARS);
        if !repo.stars_text.is_empty() {
            summary = if summary.is_empty() {
                repo.stars_text.clone()
            } else {
                format!("[{}] {summary}", repo.stars_text)
            };
        }
        RecordDraft {
            id_prefix: self.id_prefix.clone(),
            source_name: self.name.clone(),
            kind: SourceKind::Trending,
            source_weight: self.weight,
            title: format!("🌟 {}", repo.path),
            id_seed: Some(format!("{}{}", repo.path, repo.url)),
            link: repo.url,
            summary,
            // the page carries no publish time
            published_at: None,
            popularity: repo.stars_today,
        }
    }

    /// Keyword-gate and normalize the scraped pages in tab order; an id seen on
    /// an earlier tab is dropped, and the result is capped at `max_items`.
    pub fn records_from_pages<'a, I>(
        &self,
        pages: I,
        collected_at: DateTime<Utc>,
    ) -> Vec<NormalizedRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let drafts: Vec<RecordDraft> = pages
            .into_iter()
            .flat_map(parse_trending_html)
            .filter(|r| self.keywords.matches(&format!("{} {}", r.path, r.description)))
            .map(|r| self.draft(r))
            .collect();

        let mut seen = HashSet::new();
        let mut out: Vec<NormalizedRecord> = normalize_drafts(drafts, collected_at, self.missing)
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        out.truncate(self.max_items);
        out
    }

    async fn fetch_pages(
        &self,
        base_url: &str,
        tabs: &[String],
        client: &reqwest::Client,
    ) -> Result<Vec<String>> {
        let mut pages = Vec::with_capacity(tabs.len());
        let mut last_err = None;
        for tab in tabs {
            let url = tab_url(base_url, tab);
            let res: Result<String> = async {
                Ok(client
                    .get(url.as_str())
                    .header(reqwest::header::USER_AGENT, super::BROWSER_USER_AGENT)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?)
            }
            .await;
            match res {
                Ok(body) => pages.push(body),
                Err(e) => {
                    tracing::warn!(
                        source = %self.name,
                        %url,
                        error = %e,
                        "trending tab failed, skipping"
                    );
                    last_err = Some(e);
                }
            }
        }
        // Only an outage of every tab fails the source.
        match last_err {
            Some(e) if pages.is_empty() => Err(e).context("every trending tab failed"),
            _ => Ok(pages),
        }
    }
}

#[async_trait]
impl SourceProvider for GithubTrendingProvider {
    async fn fetch_latest(&self) -> Result<Vec<NormalizedRecord>> {
        let collected_at = Utc::now();
        let pages = match &self.mode {
            Mode::Fixture(pages) => pages.clone(),
            Mode::Http {
                base_url,
                tabs,
                client,
            } => self.fetch_pages(base_url, tabs, client).await?,
        };
        let records = self.records_from_pages(pages.iter().map(String::as_str), collected_at);
        tracing::debug!(
            source = %self.name,
            tabs = pages.len(),
            kept = records.len(),
            "trending scraped"
        );
        Ok(records)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
