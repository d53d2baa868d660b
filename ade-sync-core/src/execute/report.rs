use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::SyncError;
use crate::reconcile::{Anomaly, OperationEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The run was cancelled before this entry reached the destination.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal failure of a single entry.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum EntryFailure {
    #[error("still rate limited after all retries")]
    RateLimitExceeded,

    #[error("destination unavailable after all retries: {0}")]
    Unavailable(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("event vanished and could not be recreated: {0}")]
    Stale(String),

    #[error("credentials expired: {0}")]
    AuthExpired(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EntryFailure {
    /// Failure for an error that was not retried.
    pub(crate) fn from_error(err: SyncError) -> Self {
        match err {
            SyncError::DestinationRejected(reason) => EntryFailure::Rejected(reason),
            SyncError::AuthExpired(reason) => EntryFailure::AuthExpired(reason),
            SyncError::NotFound => EntryFailure::Stale(err.to_string()),
            other => EntryFailure::Internal(other.to_string()),
        }
    }

    /// Failure for a transient error that was still occurring after the last
    /// retry.
    pub(crate) fn exhausted(err: SyncError) -> Self {
        match err {
            SyncError::RateLimited(_) => EntryFailure::RateLimitExceeded,
            SyncError::DestinationUnavailable(reason) => EntryFailure::Unavailable(reason),
            other => EntryFailure::from_error(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The destination reflects the operation. `destination_id` is the id the
    /// event now lives under (none for deletes).
    Applied { destination_id: Option<String> },
    Skipped { reason: SkipReason },
    Failed { failure: EntryFailure },
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied { .. } => write!(f, "applied"),
            Outcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            Outcome::Failed { failure } => write!(f, "failed ({failure})"),
        }
    }
}

/// What happened to one plan entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReport {
    /// Position of the entry in the plan.
    pub index: usize,
    pub operation: OperationEntry,
    pub outcome: Outcome,
    /// Retries performed across all attempts, reclassification included.
    pub retries: u32,
    /// An update whose target had vanished was re-issued as a create.
    pub reclassified: bool,
}

impl EntryReport {
    pub(crate) fn skipped(index: usize, operation: OperationEntry) -> Self {
        EntryReport {
            index,
            operation,
            outcome: Outcome::Skipped {
                reason: SkipReason::Cancelled,
            },
            retries: 0,
            reclassified: false,
        }
    }

    pub(crate) fn internal(index: usize, operation: OperationEntry, reason: String) -> Self {
        EntryReport {
            index,
            operation,
            outcome: Outcome::Failed {
                failure: EntryFailure::Internal(reason),
            },
            retries: 0,
            reclassified: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Source events that needed no change.
    pub unchanged: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} unchanged, {} skipped, {} failed",
            self.applied, self.unchanged, self.skipped, self.failed
        )
    }
}

/// Report of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    /// One report per plan entry, in plan order.
    pub entries: Vec<EntryReport>,
    pub summary: SyncSummary,
    pub anomalies: Vec<Anomaly>,
}

impl SyncResult {
    pub fn new(entries: Vec<EntryReport>, anomalies: Vec<Anomaly>, unchanged: usize) -> Self {
        let mut summary = SyncSummary {
            unchanged,
            ..SyncSummary::default()
        };
        for entry in &entries {
            match entry.outcome {
                Outcome::Applied { .. } => summary.applied += 1,
                Outcome::Skipped { .. } => summary.skipped += 1,
                Outcome::Failed { .. } => summary.failed += 1,
            }
        }
        SyncResult {
            entries,
            summary,
            anomalies,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|e| e.outcome.is_failed())
    }
}
