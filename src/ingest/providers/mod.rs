// src/ingest/providers/mod.rs
pub mod github_trending;
pub mod hackernews;
pub mod rss;

pub use github_trending::GithubTrendingProvider;
pub use hackernews::HackerNewsProvider;
pub use rss::RssFeedProvider;

/// Default AI keyword list for the forum source.
pub const HN_KEYWORDS: &[&str] = &[
    "AI",
    "LLM",
    "GPT",
    "Claude",
    "Model",
    "Machine Learning",
    "OpenAI",
    "Anthropic",
    "Neural",
    "Transformer",
    "LLaMA",
    "Gemini",
];

/// Default AI keyword list for trending repositories.
pub const GITHUB_KEYWORDS: &[&str] = &[
    "ai",
    "llm",
    "gpt",
    "claude",
    "model",
    "machine learning",
    "neural",
    "transformer",
    "llama",
    "gemini",
    "openai",
    "anthropic",
    "stable diffusion",
    "langchain",
];

/// Sent by scraping adapters; the trending page serves a stripped page otherwise.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
