//! Hotness scoring.
//!
//! score = source_weight + recency_bonus(now - published_at) + source_bonus(record)
//!
//! - `recency_bonus`: ordered `(max_hours, bonus)` tiers, ascending, first match wins;
//!   unknown publish time → 0.
//! - `source_bonus`: per-source rule; `Popularity` gives +1 per `per_units` of the
//!   upstream metric, capped at `cap`.

use crate::ingest::types::{NormalizedRecord, SourceKind};
use crate::source_weights::SourceTable;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Popularity bonus rule selected per source.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceBonus {
    None,
    Popularity { per_units: u64, cap: i64 },
}

impl SourceBonus {
    /// Forum stories carry upstream points; other kinds get nothing by default.
    pub fn default_for(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Forum => Self::Popularity {
                per_units: 100,
                cap: 10,
            },
            SourceKind::Blog | SourceKind::Trending => Self::None,
        }
    }

    pub fn bonus(&self, popularity: Option<u64>) -> i64 {
        match (*self, popularity) {
            (Self::Popularity { per_units, cap }, Some(metric)) if per_units > 0 => {
                let steps = i64::try_from(metric / per_units).unwrap_or(i64::MAX);
                steps.min(cap).max(0)
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct RecencyTier {
    pub max_hours: f64,
    pub bonus: i64,
}

/// Recency tiers kept sorted by `max_hours`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(from = "Vec<RecencyTier>")]
pub struct RecencyTiers(Vec<RecencyTier>);

impl From<Vec<RecencyTier>> for RecencyTiers {
    fn from(v: Vec<RecencyTier>) -> Self {
        Self::new(v)
    }
}

impl Default for RecencyTiers {
    fn default() -> Self {
        Self::new(vec![
            RecencyTier {
                max_hours: 1.0,
                bonus: 20,
            },
            RecencyTier {
                max_hours: 3.0,
                bonus: 10,
            },
        ])
    }
}

impl RecencyTiers {
    pub fn new(mut tiers: Vec<RecencyTier>) -> Self {
        tiers.retain(|t| t.max_hours.is_finite());
        tiers.sort_by(|a, b| a.max_hours.total_cmp(&b.max_hours));
        Self(tiers)
    }

    pub fn tiers(&self) -> &[RecencyTier] {
        &self.0
    }

    /// Bonus for the elapsed time since publication. A publish time in the
    /// future counts as zero elapsed.
    pub fn bonus(&self, elapsed: Option<Duration>) -> i64 {
        let Some(elapsed) = elapsed else {
            return 0;
        };
        let hours = (elapsed.num_milliseconds().max(0) as f64) / 3_600_000.0;
        self.0
            .iter()
            .find(|t| hours <= t.max_hours)
            .map(|t| t.bonus)
            .unwrap_or(0)
    }
}

/// Everything the scorer needs, injected by the caller.
#[derive(Debug, Clone, Default)]
pub struct ScoringConfig {
    pub recency: RecencyTiers,
    pub sources: SourceTable,
}

/// Pure hotness score of one record at `now`.
pub fn score(record: &NormalizedRecord, now: DateTime<Utc>, cfg: &ScoringConfig) -> i64 {
    let elapsed = record.published_at.map(|ts| now.signed_duration_since(ts));
    let recency = cfg.recency.bonus(elapsed);
    let bonus = cfg
        .sources
        .bonus_for(&record.source_name, record.kind)
        .bonus(record.popularity);
    record.source_weight + recency + bonus
}

/// Set `score` on every record.
pub fn apply_scores(records: &mut [NormalizedRecord], now: DateTime<Utc>, cfg: &ScoringConfig) {
    for r in records.iter_mut() {
        r.score = score(r, now, cfg);
    }
}
