// src/analyze/rank.rs
//! Ranking: score descending, ties kept in discovery order, truncated to top-N.

use crate::ingest::types::NormalizedRecord;
use serde::Deserialize;

/// Upper bound for a single selection.
pub const MAX_TOP_N: usize = 50;

/// Selection size, always in `1..=MAX_TOP_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "usize")]
pub struct TopN(usize);

impl TopN {
    /// Clamp into range; out-of-range values are logged.
    pub fn new(n: usize) -> Self {
        let clamped = n.clamp(1, MAX_TOP_N);
        if clamped != n {
            tracing::warn!(requested = n, used = clamped, "top_n out of range, clamped");
        }
        Self(clamped)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for TopN {
    fn default() -> Self {
        Self(5)
    }
}

impl From<usize> for TopN {
    fn from(n: usize) -> Self {
        Self::new(n)
    }
}

/// Stable sort by score (desc), then keep the first `top_n`.
pub fn select_top(mut records: Vec<NormalizedRecord>, top_n: TopN) -> Vec<NormalizedRecord> {
    records.sort_by(|a, b| b.score.cmp(&a.score));
    records.truncate(top_n.get());
    records
}
