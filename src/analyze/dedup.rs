// src/analyze/dedup.rs
//! Deduplication against delivery history, then against links seen earlier in
//! the same batch. Input order is preserved among survivors.

use crate::history::DeliveryHistory;
use crate::ingest::canonical_link;
use crate::ingest::types::NormalizedRecord;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub already_delivered: usize,
    pub duplicate_link: usize,
}

impl DedupStats {
    pub fn dropped(&self) -> usize {
        self.already_delivered + self.duplicate_link
    }
}

/// 1) drop ids in `history`; 2) keep the first record per canonical link.
/// Records with an empty link are never collapsed into each other.
pub fn dedup(
    records: Vec<NormalizedRecord>,
    history: &DeliveryHistory,
) -> (Vec<NormalizedRecord>, DedupStats) {
    let mut stats = DedupStats::default();
    let mut seen_links: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(records.len());

    for rec in records {
        if history.contains(&rec.id) {
            stats.already_delivered += 1;
            continue;
        }
        if let Some(key) = canonical_link(&rec.link) {
            if !seen_links.insert(key) {
                stats.duplicate_link += 1;
                continue;
            }
        }
        keep.push(rec);
    }

    (keep, stats)
}
