// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod source_weights;

// Candidate processing (dedup, scoring, ranking)
pub mod analyze;

// Sources and the normalization contract
pub mod ingest;

// Delivery sinks
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::config::RadarConfig;
pub use crate::history::{DeliveryHistory, HistoryStore};
pub use crate::ingest::types::{NormalizedRecord, SourceKind, SourceProvider};
pub use crate::notify::{DeliverySink, Digest};
pub use crate::pipeline::{Pipeline, PipelineConfig, RunReport, RunState, RunStatus};
