// src/error.rs
//! Error taxonomy of a radar run.
//!
//! Only `DeliveryError` can turn a run into a failure; everything else is
//! recovered where it is detected and surfaced as a logged warning.

use std::path::PathBuf;
use std::time::Duration;

/// One adapter failed (network, parse, timeout). The run continues without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// A single upstream item that could not be turned into a `NormalizedRecord`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed record from {source_name}: {reason}")]
pub struct MalformedRecord {
    pub source_name: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("history encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("another run holds the history lock {path}")]
    Locked { path: PathBuf },
}

impl HistoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Network error or non-2xx status. Worth one more attempt.
    #[error("transient delivery error: {0}")]
    Transient(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The sink answered but refused the message (e.g. webhook `code != 0`).
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Transient(format!("timeout: {e}"))
        } else {
            Self::Transient(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_is_not_transient() {
        assert!(DeliveryError::Transient("502".into()).is_transient());
        assert!(DeliveryError::Timeout(Duration::from_secs(10)).is_transient());
        assert!(!DeliveryError::Rejected("code 19001".into()).is_transient());
    }

    #[test]
    fn source_failure_display() {
        let f = SourceFailure {
            source: "Hacker News".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(f.to_string(), "Hacker News: connection refused");
    }
}
