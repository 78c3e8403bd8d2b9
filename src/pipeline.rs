// src/pipeline.rs
//! One radar run: fetch → dedup → score → rank → deliver → persist.
//!
//! The history is only marked after the sink confirmed the delivery of a
//! non-empty selection. A run never panics; every failure ends up in the
//! returned [`RunReport`].

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use std::time::Duration;

use crate::analyze::{dedup, score_and_select, ScoringConfig, TopN};
use crate::error::SourceFailure;
use crate::history::HistoryStore;
use crate::ingest::{aggregate, types::NormalizedRecord, types::SourceProvider};
use crate::notify::{deliver_with_retry, DeliveryOutcome, DeliverySink, Digest, RetryPolicy};

/// Orchestrator states, in the order a run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Fetching,
    Deduping,
    Scoring,
    Ranking,
    /// Nothing survived fetch or dedup; the sink still gets a NothingNew digest.
    Empty,
    Delivering,
    Persisting,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// A non-empty selection reached the sink.
    Delivered,
    /// The sink was told there was nothing new.
    NothingNew,
    /// The sink failed after the retry; history untouched.
    DeliveryFailed,
    /// Another run holds the history lock; nothing was done.
    Skipped,
}

impl RunStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Delivered | Self::NothingNew)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::NothingNew => "nothing_new",
            Self::DeliveryFailed => "delivery_failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    /// History could not be read and was treated as empty.
    HistoryLoad(String),
    /// Delivery succeeded but the history could not be written.
    HistorySave(String),
    /// Dry run: delivered to the preview sink, history not persisted.
    DryRun,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub transitions: Vec<RunState>,
    pub fetched: usize,
    pub after_dedup: usize,
    pub selected: Vec<NormalizedRecord>,
    pub source_failures: Vec<SourceFailure>,
    pub warnings: Vec<RunWarning>,
    pub delivery: Option<DeliveryOutcome>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            status: RunStatus::Skipped,
            transitions: Vec::new(),
            fetched: 0,
            after_dedup: 0,
            selected: Vec::new(),
            source_failures: Vec::new(),
            warnings: Vec::new(),
            delivery: None,
        }
    }

    fn enter(&mut self, state: RunState) {
        tracing::debug!(?state, "pipeline state");
        self.transitions.push(state);
    }

    pub fn final_state(&self) -> Option<RunState> {
        self.transitions.last().copied()
    }
}

/// Everything a run needs besides its collaborators. Built by the caller;
/// the pipeline reads no globals.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scoring: ScoringConfig,
    pub top_n: TopN,
    /// Per-source fetch timeout.
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
    /// Deliver, but never write the history.
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            top_n: TopN::default(),
            fetch_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            dry_run: false,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    providers: Vec<Box<dyn SourceProvider>>,
    sink: Box<dyn DeliverySink>,
    store: HistoryStore,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        providers: Vec<Box<dyn SourceProvider>>,
        sink: Box<dyn DeliverySink>,
        store: HistoryStore,
    ) -> Self {
        Self {
            config,
            providers,
            sink,
            store,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub async fn run(&self) -> RunReport {
        self.run_at(Utc::now()).await
    }

    /// Run once with a fixed "now" for the recency bonus.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunReport {
        crate::metrics::ensure_described();
        let mut report = RunReport::new();

        let _lock = match self.store.lock() {
            Ok(lock) => lock,
            Err(e) => {
                tracing::warn!(error = %e, "history lock unavailable, skipping run");
                return finish(report);
            }
        };

        let loaded = self.store.load_or_empty();
        if let Some(e) = &loaded.error {
            report.warnings.push(RunWarning::HistoryLoad(e.to_string()));
        }
        let can_save = loaded.can_save();
        let mut history = loaded.history;

        report.enter(RunState::Fetching);
        let fetched = aggregate(&self.providers, self.config.fetch_timeout).await;
        report.fetched = fetched.records.len();
        report.source_failures = fetched.failures;

        let selected = if fetched.records.is_empty() {
            Vec::new()
        } else {
            report.enter(RunState::Deduping);
            let (fresh, stats) = dedup(fetched.records, &history);
            report.after_dedup = fresh.len();
            counter!("radar_dedup_dropped_total").increment(stats.dropped() as u64);
            tracing::info!(
                fetched = report.fetched,
                already_delivered = stats.already_delivered,
                duplicate_link = stats.duplicate_link,
                kept = fresh.len(),
                "candidates deduplicated"
            );

            if fresh.is_empty() {
                Vec::new()
            } else {
                report.enter(RunState::Scoring);
                report.enter(RunState::Ranking);
                score_and_select(fresh, now, &self.config.scoring, self.config.top_n)
            }
        };

        if selected.is_empty() {
            report.enter(RunState::Empty);
        }
        report.enter(RunState::Delivering);
        let digest = Digest::from_selection(&selected);
        let outcome = deliver_with_retry(self.sink.as_ref(), &digest, &self.config.retry).await;
        let delivered = outcome.is_delivered();
        report.delivery = Some(outcome);

        if !delivered {
            counter!("radar_delivery_failures_total").increment(1);
            report.enter(RunState::Failed);
            report.status = RunStatus::DeliveryFailed;
            report.selected = selected;
            return finish(report);
        }

        if selected.is_empty() {
            report.status = RunStatus::NothingNew;
            report.enter(RunState::Done);
            return finish(report);
        }

        counter!("radar_selected_total").increment(selected.len() as u64);
        report.status = RunStatus::Delivered;

        if self.config.dry_run {
            tracing::info!("dry run, history not persisted");
            report.warnings.push(RunWarning::DryRun);
        } else if !can_save {
            tracing::error!("unreadable history still in place, not overwriting it");
            counter!("radar_history_save_failures_total").increment(1);
            report.warnings.push(RunWarning::HistorySave(
                "unreadable history left in place, delivered ids not recorded".into(),
            ));
        } else {
            report.enter(RunState::Persisting);
            let added = history.mark_delivered(selected.iter().map(|r| r.id.clone()), now);
            match self.store.save(&history) {
                Ok(()) => tracing::info!(added, total = history.len(), "history updated"),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "history save failed; these items may be delivered again"
                    );
                    counter!("radar_history_save_failures_total").increment(1);
                    report.warnings.push(RunWarning::HistorySave(e.to_string()));
                }
            }
        }

        report.selected = selected;
        report.enter(RunState::Done);
        finish(report)
    }
}

fn finish(report: RunReport) -> RunReport {
    counter!("radar_runs_total", "status" => report.status.as_str()).increment(1);
    gauge!("radar_last_run_ts").set(Utc::now().timestamp() as f64);
    tracing::info!(
        status = report.status.as_str(),
        fetched = report.fetched,
        after_dedup = report.after_dedup,
        selected = report.selected.len(),
        source_failures = report.source_failures.len(),
        warnings = report.warnings.len(),
        "run finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_success_flags() {
        assert!(RunStatus::Delivered.is_success());
        assert!(RunStatus::NothingNew.is_success());
        assert!(!RunStatus::DeliveryFailed.is_success());
        assert!(!RunStatus::Skipped.is_success());
    }

    #[test]
    fn fresh_report_has_no_state() {
        let r = RunReport::new();
        assert_eq!(r.final_state(), None);
        assert_eq!(r.status, RunStatus::Skipped);
    }
}
