//! # Source Weights
//!
//! Configurable per-source table: static weight assigned by adapters and the
//! popularity bonus rule consumed by the scorer.
//!
//! - Loads from the `[sources]` table of the radar config (weights, bonuses, aliases).
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Aliases map alternative spellings to canonical sources.
//! - Weight fallback order: aliases → exact match → default.
//! - Bonus fallback order: aliases → exact match → rule for the source kind.
//! - Includes a built-in `default_seed()` with the stock sources.

use crate::analyze::scoring::SourceBonus;
use crate::ingest::types::SourceKind;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceTable {
    /// Weight if no match is found.
    #[serde(default)]
    pub default_weight: i64,
    /// Explicit weights for canonical source names.
    #[serde(default)]
    pub weights: HashMap<String, i64>,
    /// Explicit bonus rules for canonical source names.
    #[serde(default)]
    pub bonuses: HashMap<String, SourceBonus>,
    /// Aliases mapping non-canonical names → canonical names.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl Default for SourceTable {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceTable {
    /// Normalize all keys once so lookups only normalize the query.
    pub fn normalized(self) -> Self {
        Self {
            default_weight: self.default_weight,
            weights: self
                .weights
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            bonuses: self
                .bonuses
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            aliases: self
                .aliases
                .into_iter()
                .map(|(k, v)| (normalize(&k), normalize(&v)))
                .collect(),
        }
    }

    fn canonical(&self, source: &str) -> String {
        let s = normalize(source);
        self.aliases.get(&s).cloned().unwrap_or(s)
    }

    /// Static weight for a source name.
    pub fn weight_for(&self, source: &str) -> i64 {
        let c = self.canonical(source);
        self.weights.get(&c).copied().unwrap_or(self.default_weight)
    }

    /// Bonus rule for a record's source; falls back to the kind default.
    pub fn bonus_for(&self, source: &str, kind: SourceKind) -> SourceBonus {
        let c = self.canonical(source);
        self.bonuses
            .get(&c)
            .copied()
            .unwrap_or_else(|| SourceBonus::default_for(kind))
    }

    /// Built-in seed with the stock sources.
    pub fn default_seed() -> Self {
        let weights = [
            ("OpenAI Blog", 50),
            ("Anthropic Blog", 50),
            ("GitHub Trending", 40),
            ("Hacker News", 30),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let aliases = [
            ("hn", "Hacker News"),
            ("hackernews", "Hacker News"),
            ("ycombinator", "Hacker News"),
            ("openai", "OpenAI Blog"),
            ("anthropic", "Anthropic Blog"),
            ("github", "GitHub Trending"),
        ]
        .into_iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect();

        Self {
            default_weight: 0,
            weights,
            bonuses: HashMap::new(),
            aliases,
        }
        .normalized()
    }
}

/// Normalize input string: lowercase, replace punctuation/dashes with spaces,
/// collapse multiple spaces into one.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\''], " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
