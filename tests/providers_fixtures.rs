// tests/providers_fixtures.rs
use ai_news_radar::ingest::providers::hackernews::HnItem;
use ai_news_radar::ingest::providers::{
    GithubTrendingProvider, HackerNewsProvider, RssFeedProvider, GITHUB_KEYWORDS, HN_KEYWORDS,
};
use ai_news_radar::ingest::{aggregate, KeywordFilter, MissingPublishedAt};
use ai_news_radar::{SourceKind, SourceProvider};
use chrono::{TimeZone, Utc};
use std::time::Duration;

const OPENAI_XML: &str = include_str!("fixtures/openai_rss.xml");
const ANTHROPIC_XML: &str = include_str!("fixtures/anthropic_atom.xml");
const HN_JSON: &str = include_str!("fixtures/hn_items.json");
const TRENDING_HTML: &str = include_str!("fixtures/github_trending.html");

fn hn_items() -> Vec<HnItem> {
    serde_json::from_str(HN_JSON).unwrap()
}

#[tokio::test]
async fn openai_rss_fixture() {
    let p = RssFeedProvider::from_fixture_str("OpenAI Blog", OPENAI_XML, "openai", 50);
    let out = p.fetch_latest().await.unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].title, "Introducing GPT agents for teams");
    assert_eq!(out[0].summary, "Agents that work across your team's tools.");
    assert_eq!(
        out[0].published_at,
        Some(Utc.with_ymd_and_hms(2025, 9, 6, 11, 30, 0).unwrap())
    );
    assert!(out.iter().all(|r| r.kind == SourceKind::Blog && r.source_weight == 50));
    assert_eq!(out[2].published_at, None, "no pubDate stays unknown");
}

#[tokio::test]
async fn anthropic_atom_fixture() {
    let p = RssFeedProvider::from_fixture_str("Anthropic Blog", ANTHROPIC_XML, "anthropic", 50)
        .with_missing_published(MissingPublishedAt::FetchTime);
    let out = p.fetch_latest().await.unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].link, "https://www.anthropic.com/news/claude-memory");
    assert_eq!(out[1].summary, "What we learned this quarter.");
    // `updated` stands in for a missing `published`
    assert_eq!(
        out[1].published_at,
        Some(Utc.with_ymd_and_hms(2025, 9, 4, 8, 0, 0).unwrap())
    );
    assert!(out[0].id.starts_with("anthropic_"));
}

#[tokio::test]
async fn ids_are_stable_across_fetches() {
    let p = RssFeedProvider::from_fixture_str("OpenAI Blog", OPENAI_XML, "openai", 50);
    let a = p.fetch_latest().await.unwrap();
    let b = p.fetch_latest().await.unwrap();
    let ids = |v: &[ai_news_radar::NormalizedRecord]| {
        v.iter().map(|r| r.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&a), ids(&b));
}

#[tokio::test]
async fn hackernews_fixture_keeps_ai_stories() {
    let p = HackerNewsProvider::from_items(
        "Hacker News",
        hn_items(),
        30,
        KeywordFilter::new(HN_KEYWORDS).unwrap(),
    );
    let out = p.fetch_latest().await.unwrap();
    let titles: Vec<_> = out.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Show HN: Running an LLM on a Raspberry Pi",
            "Ask HN: How do you evaluate Claude vs Gemini?"
        ]
    );
    assert_eq!(out[0].popularity, Some(512));
    assert_eq!(out[1].link, "https://news.ycombinator.com/item?id=41000003");
}

#[tokio::test]
async fn hackernews_id_prefix_override() {
    let p = HackerNewsProvider::from_items(
        "Hacker News",
        hn_items(),
        30,
        KeywordFilter::new(HN_KEYWORDS).unwrap(),
    )
    .with_id_prefix("ycomb");
    let out = p.fetch_latest().await.unwrap();
    assert!(!out.is_empty());
    assert!(out.iter().all(|r| r.id.starts_with("ycomb_")));
}

#[tokio::test]
async fn trending_fixture() {
    let p = GithubTrendingProvider::from_fixture_pages(
        "GitHub Trending",
        vec![TRENDING_HTML.to_string(), TRENDING_HTML.to_string()],
        40,
        KeywordFilter::new(GITHUB_KEYWORDS).unwrap(),
    );
    let out = p.fetch_latest().await.unwrap();
    let titles: Vec<_> = out.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["🌟 acme/agent-kit", "🌟 lab/tiny-diffusion"]);
    assert_eq!(out[0].popularity, Some(2310));
    assert!(out[0].summary.starts_with("[2,310 stars today] Build LLM agents"));
    assert!(out.iter().all(|r| r.published_at.is_none()));
}

#[tokio::test]
async fn aggregate_concatenates_in_provider_order() {
    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(RssFeedProvider::from_fixture_str("OpenAI Blog", OPENAI_XML, "openai", 50)),
        Box::new(RssFeedProvider::from_fixture_str("Broken Blog", "<html>", "broken", 50)),
        Box::new(HackerNewsProvider::from_items(
            "Hacker News",
            hn_items(),
            30,
            KeywordFilter::new(HN_KEYWORDS).unwrap(),
        )),
    ];
    let out = aggregate(&providers, Duration::from_secs(5)).await;
    assert_eq!(out.records.len(), 5);
    assert_eq!(out.records[0].source_name, "OpenAI Blog");
    assert_eq!(out.records[4].source_name, "Hacker News");
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].source, "Broken Blog");
}
