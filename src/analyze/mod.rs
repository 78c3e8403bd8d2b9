// src/analyze/mod.rs
//! Candidate processing: dedup → scoring → ranking.

pub mod dedup;
pub mod rank;
pub mod scoring;

pub use crate::analyze::dedup::{dedup, DedupStats};
pub use crate::analyze::rank::{select_top, TopN, MAX_TOP_N};
pub use crate::analyze::scoring::{
    apply_scores, score, RecencyTier, RecencyTiers, ScoringConfig, SourceBonus,
};

use crate::ingest::types::NormalizedRecord;
use chrono::{DateTime, Utc};

/// Score the deduplicated candidates and keep the top `top_n`.
pub fn score_and_select(
    mut candidates: Vec<NormalizedRecord>,
    now: DateTime<Utc>,
    cfg: &ScoringConfig,
    top_n: TopN,
) -> Vec<NormalizedRecord> {
    apply_scores(&mut candidates, now, cfg);
    select_top(candidates, top_n)
}
