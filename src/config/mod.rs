// src/config/mod.rs
//! Radar configuration: TOML file plus a few environment overrides.
//!
//! Resolution: `$RADAR_CONFIG_PATH` → `config/radar.toml` → built-in defaults.
//! Everything the pipeline needs is turned into explicit values here
//! ([`PipelineConfig`], providers, sink); nothing downstream reads the env.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::analyze::{RecencyTiers, ScoringConfig, TopN};
use crate::history::HistoryStore;
use crate::ingest::providers::{
    github_trending, hackernews, GithubTrendingProvider, HackerNewsProvider, RssFeedProvider,
    BROWSER_USER_AGENT, GITHUB_KEYWORDS, HN_KEYWORDS,
};
use crate::ingest::types::SourceProvider;
use crate::ingest::{KeywordFilter, MissingPublishedAt};
use crate::notify::{DeliverySink, FeishuWebhook, LogSink, RetryPolicy, SlackWebhook};
use crate::pipeline::PipelineConfig;
use crate::scheduler::SchedulerCfg;
use crate::source_weights::SourceTable;

pub const ENV_CONFIG_PATH: &str = "RADAR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/radar.toml";
pub const ENV_FEISHU_WEBHOOK: &str = "FEISHU_WEBHOOK_URL";
pub const ENV_SLACK_WEBHOOK: &str = "SLACK_WEBHOOK_URL";
pub const ENV_TEST_MODE: &str = "TEST_MODE";
pub const ENV_TOP_N: &str = "RADAR_TOP_N";
pub const ENV_HISTORY_PATH: &str = "RADAR_HISTORY_PATH";
pub const ENV_MODE: &str = "RADAR_MODE";

fn default_interval_secs() -> u64 {
    3600
}
fn default_history_path() -> PathBuf {
    PathBuf::from("data/processed.json")
}
fn default_lock_stale_secs() -> u64 {
    1800
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// `once`: one run and exit. `schedule`: run now, then every interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Once,
    Schedule,
}

impl std::str::FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "schedule" | "scheduled" => Ok(Self::Schedule),
            other => bail!("unknown run mode `{other}` (expected once|schedule)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub id_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HackerNewsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "HackerNewsConfig::default_name")]
    pub name: String,
    #[serde(default = "HackerNewsConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "HackerNewsConfig::default_top_limit")]
    pub top_limit: usize,
    #[serde(default = "HackerNewsConfig::default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "HackerNewsConfig::default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "HackerNewsConfig::default_id_prefix")]
    pub id_prefix: String,
}

impl HackerNewsConfig {
    fn default_id_prefix() -> String {
        "hn".into()
    }
    fn default_name() -> String {
        "Hacker News".into()
    }
    fn default_api_base() -> String {
        hackernews::DEFAULT_API_BASE.into()
    }
    fn default_top_limit() -> usize {
        hackernews::DEFAULT_TOP_LIMIT
    }
    fn default_concurrency() -> usize {
        hackernews::DEFAULT_CONCURRENCY
    }
    fn default_keywords() -> Vec<String> {
        HN_KEYWORDS.iter().map(|s| s.to_string()).collect()
    }
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: Self::default_name(),
            api_base: Self::default_api_base(),
            top_limit: Self::default_top_limit(),
            concurrency: Self::default_concurrency(),
            keywords: Self::default_keywords(),
            id_prefix: Self::default_id_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "GithubConfig::default_name")]
    pub name: String,
    #[serde(default = "GithubConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "GithubConfig::default_tabs")]
    pub tabs: Vec<String>,
    #[serde(default = "GithubConfig::default_max_items")]
    pub max_items: usize,
    #[serde(default = "GithubConfig::default_keywords")]
    pub keywords: Vec<String>,
}

impl GithubConfig {
    fn default_name() -> String {
        "GitHub Trending".into()
    }
    fn default_base_url() -> String {
        github_trending::DEFAULT_BASE_URL.into()
    }
    fn default_tabs() -> Vec<String> {
        github_trending::DEFAULT_TABS.iter().map(|s| s.to_string()).collect()
    }
    fn default_max_items() -> usize {
        github_trending::DEFAULT_MAX_ITEMS
    }
    fn default_keywords() -> Vec<String> {
        GITHUB_KEYWORDS.iter().map(|s| s.to_string()).collect()
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: Self::default_name(),
            base_url: Self::default_base_url(),
            tabs: Self::default_tabs(),
            max_items: Self::default_max_items(),
            keywords: Self::default_keywords(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Feishu,
    Slack,
    /// Render to the log only.
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub kind: SinkKind,
    /// `"ENV"` reads `FEISHU_WEBHOOK_URL` / `SLACK_WEBHOOK_URL` by kind.
    #[serde(default = "DeliveryConfig::default_webhook")]
    pub webhook_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default = "DeliveryConfig::default_first_timeout")]
    pub first_timeout_secs: u64,
    #[serde(default = "DeliveryConfig::default_retry_timeout")]
    pub retry_timeout_secs: u64,
}

impl DeliveryConfig {
    fn default_webhook() -> String {
        "ENV".into()
    }
    fn default_first_timeout() -> u64 {
        10
    }
    fn default_retry_timeout() -> u64 {
        15
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            first_timeout: Duration::from_secs(self.first_timeout_secs),
            retry_timeout: Duration::from_secs(self.retry_timeout_secs),
        }
    }

    fn resolve_webhook(&self) -> Result<String> {
        if !self.webhook_url.trim().eq_ignore_ascii_case("env") {
            return Ok(self.webhook_url.trim().to_string());
        }
        let var = match self.kind {
            SinkKind::Feishu => ENV_FEISHU_WEBHOOK,
            SinkKind::Slack => ENV_SLACK_WEBHOOK,
            SinkKind::Log => return Ok(String::new()),
        };
        env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing {var} env var"))
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            webhook_url: Self::default_webhook(),
            title: None,
            footer: None,
            first_timeout_secs: Self::default_first_timeout(),
            retry_timeout_secs: Self::default_retry_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RadarConfig {
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub top_n: TopN,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub missing_published_at: MissingPublishedAt,
    #[serde(default)]
    pub recency: RecencyTiers,
    #[serde(default)]
    pub sources: SourceTable,
    #[serde(default = "RadarConfig::default_feeds")]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub hackernews: HackerNewsConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            top_n: TopN::default(),
            interval_secs: default_interval_secs(),
            dry_run: false,
            history_path: default_history_path(),
            lock_stale_secs: default_lock_stale_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            missing_published_at: MissingPublishedAt::default(),
            recency: RecencyTiers::default(),
            sources: SourceTable::default(),
            feeds: Self::default_feeds(),
            hackernews: HackerNewsConfig::default(),
            github: GithubConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl RadarConfig {
    fn default_feeds() -> Vec<FeedConfig> {
        vec![
            FeedConfig {
                name: "OpenAI Blog".into(),
                url: "https://openai.com/blog/rss.xml".into(),
                id_prefix: "openai".into(),
            },
            FeedConfig {
                name: "Anthropic Blog".into(),
                url: "https://www.anthropic.com/blog/rss.xml".into(),
                id_prefix: "anthropic".into(),
            },
        ]
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: RadarConfig = toml::from_str(s)?;
        cfg.sources = cfg.sources.normalized();
        cfg.validate()?;
        Ok(cfg)
    }

    /// The run lock may only go stale after the longest possible run: every
    /// source timing out plus both delivery attempts.
    pub fn validate(&self) -> Result<()> {
        let longest_run = self.fetch_timeout_secs
            + self.delivery.first_timeout_secs
            + self.delivery.retry_timeout_secs;
        if self.lock_stale_secs <= longest_run {
            bail!(
                "lock_stale_secs ({}) must exceed fetch and delivery timeouts ({longest_run})",
                self.lock_stale_secs
            );
        }
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading radar config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    /// `$RADAR_CONFIG_PATH`, then `config/radar.toml`, then defaults; env
    /// overrides are applied last.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            Self::load_from_file(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)?
        } else {
            tracing::info!("no radar config file, using built-in defaults");
            Self::default()
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var(ENV_TEST_MODE) {
            if v.trim().eq_ignore_ascii_case("true") {
                self.dry_run = true;
            }
        }
        if let Ok(v) = env::var(ENV_TOP_N) {
            let n: usize = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TOP_N} must be a positive integer, got `{v}`"))?;
            self.top_n = TopN::new(n);
        }
        if let Ok(v) = env::var(ENV_HISTORY_PATH) {
            if !v.trim().is_empty() {
                self.history_path = PathBuf::from(v.trim());
            }
        }
        if let Ok(v) = env::var(ENV_MODE) {
            self.mode = v.parse()?;
        }
        self.validate()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            scoring: ScoringConfig {
                recency: self.recency.clone(),
                sources: self.sources.clone(),
            },
            top_n: self.top_n,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            retry: self.delivery.retry_policy(),
            dry_run: self.dry_run,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerCfg {
        SchedulerCfg {
            interval: Duration::from_secs(self.interval_secs.max(1)),
        }
    }

    pub fn history_store(&self) -> HistoryStore {
        HistoryStore::new(&self.history_path)
            .with_lock_stale_after(Duration::from_secs(self.lock_stale_secs))
    }

    /// Build the adapters in a fixed order: feeds, forum, trending.
    pub fn build_providers(&self) -> Result<Vec<Box<dyn SourceProvider>>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.fetch_timeout_secs))
            .build()
            .context("building http client")?;
        let scrape_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.fetch_timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("building http client")?;

        let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
        for f in &self.feeds {
            out.push(Box::new(
                RssFeedProvider::from_url(
                    &f.name,
                    &f.url,
                    &f.id_prefix,
                    self.sources.weight_for(&f.name),
                    client.clone(),
                )
                .with_missing_published(self.missing_published_at),
            ));
        }

        let hn = &self.hackernews;
        if hn.enabled {
            out.push(Box::new(
                HackerNewsProvider::from_api(
                    &hn.name,
                    &hn.api_base,
                    self.sources.weight_for(&hn.name),
                    KeywordFilter::new(hn.keywords.as_slice()).context("hackernews keywords")?,
                    client.clone(),
                )
                .with_id_prefix(&hn.id_prefix)
                .with_top_limit(hn.top_limit)
                .with_concurrency(hn.concurrency)
                .with_missing_published(self.missing_published_at),
            ));
        }

        let gh = &self.github;
        if gh.enabled {
            out.push(Box::new(
                GithubTrendingProvider::from_url(
                    &gh.name,
                    &gh.base_url,
                    gh.tabs.clone(),
                    self.sources.weight_for(&gh.name),
                    KeywordFilter::new(gh.keywords.as_slice()).context("github keywords")?,
                    scrape_client,
                )
                .with_max_items(gh.max_items)
                .with_missing_published(self.missing_published_at),
            ));
        }

        tracing::info!(providers = out.len(), "sources configured");
        Ok(out)
    }

    /// Dry run always renders to the log; otherwise the configured webhook.
    pub fn build_sink(&self) -> Result<Box<dyn DeliverySink>> {
        if self.dry_run || self.delivery.kind == SinkKind::Log {
            return Ok(Box::new(LogSink));
        }
        let url = self.delivery.resolve_webhook()?;
        let d = &self.delivery;
        Ok(match d.kind {
            SinkKind::Feishu => {
                let mut hook = FeishuWebhook::new(url);
                if let Some(t) = &d.title {
                    hook = hook.with_title(t);
                }
                if let Some(f) = &d.footer {
                    hook = hook.with_footer(f);
                }
                Box::new(hook)
            }
            SinkKind::Slack => {
                let mut hook = SlackWebhook::new(url);
                if let Some(t) = &d.title {
                    hook = hook.with_title(t);
                }
                Box::new(hook)
            }
            SinkKind::Log => Box::new(LogSink),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_stock_deployment() {
        let cfg = RadarConfig::default();
        assert_eq!(cfg.top_n.get(), 5);
        assert_eq!(cfg.interval_secs, 3600);
        assert_eq!(cfg.sources.weight_for("OpenAI Blog"), 50);
        assert_eq!(cfg.sources.weight_for("Hacker News"), 30);
        assert_eq!(cfg.feeds.len(), 2);
        assert_eq!(cfg.delivery.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = RadarConfig::from_toml_str(
            r#"
top_n = 80
mode = "schedule"

[github]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.top_n.get(), crate::analyze::MAX_TOP_N);
        assert_eq!(cfg.mode, RunMode::Schedule);
        assert!(!cfg.github.enabled);
        assert!(cfg.hackernews.enabled);
        assert_eq!(cfg.history_path, PathBuf::from("data/processed.json"));
    }

    #[test]
    fn lock_window_must_outlast_a_run() {
        let err = RadarConfig::from_toml_str("lock_stale_secs = 0").unwrap_err();
        assert!(err.to_string().contains("lock_stale_secs"));

        // 30 s fetch + 10 s + 15 s delivery
        assert!(RadarConfig::from_toml_str("lock_stale_secs = 55").is_err());
        assert!(RadarConfig::from_toml_str("lock_stale_secs = 56").is_ok());
        assert!(RadarConfig::from_toml_str(
            "lock_stale_secs = 120\nfetch_timeout_secs = 100"
        )
        .is_err());
        assert!(RadarConfig::default().validate().is_ok());
    }

    #[test]
    fn hackernews_id_prefix_is_configurable() {
        let cfg = RadarConfig::from_toml_str("[hackernews]\nid_prefix = \"ycomb\"").unwrap();
        assert_eq!(cfg.hackernews.id_prefix, "ycomb");
        assert_eq!(RadarConfig::default().hackernews.id_prefix, "hn");
    }

    #[test]
    fn run_mode_parses() {
        assert_eq!("Once".parse::<RunMode>().unwrap(), RunMode::Once);
        assert_eq!("schedule".parse::<RunMode>().unwrap(), RunMode::Schedule);
        assert!("daily".parse::<RunMode>().is_err());
    }

    #[test]
    fn literal_webhook_is_used_as_is() {
        let d = DeliveryConfig {
            webhook_url: " https://hook.test/x ".into(),
            ..DeliveryConfig::default()
        };
        assert_eq!(d.resolve_webhook().unwrap(), "https://hook.test/x");
    }
}
