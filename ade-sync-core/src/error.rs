//! Error types for the sync engine.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching, reconciling or applying events.
///
/// Fetch-phase variants abort a run before anything is written. Destination
/// variants raised while applying operations are folded into the per-entry
/// report instead of being propagated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Schedule source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Schedule source returned malformed data: {0}")]
    SourceFormat(String),

    #[error("Calendar destination unavailable: {0}")]
    DestinationUnavailable(String),

    #[error("Calendar destination rejected the request: {0}")]
    DestinationRejected(String),

    #[error("Rate limited, retry after {}s", .0.as_secs_f64())]
    RateLimited(Duration),

    #[error("Event not found at destination")]
    NotFound,

    #[error("Inconsistent destination state: {0}")]
    InconsistentState(String),

    #[error("Credentials expired or could not be refreshed: {0}")]
    AuthExpired(String),

    #[error("Invalid configuration for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    #[error("Sync run cancelled")]
    RunCancelled,
}

impl SyncError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the executor may retry the operation that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::RateLimited(_) | SyncError::DestinationUnavailable(_)
        )
    }
}

/// Result type alias for engine operations.
pub type CoreResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::RateLimited(Duration::from_secs(1)).is_transient());
        assert!(SyncError::DestinationUnavailable("503".into()).is_transient());
        assert!(!SyncError::NotFound.is_transient());
        assert!(!SyncError::DestinationRejected("bad range".into()).is_transient());
        assert!(!SyncError::AuthExpired("revoked".into()).is_transient());
    }

    #[test]
    fn test_config_error_message_names_field() {
        let err = SyncError::config("sync.workers", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'sync.workers': must be at least 1"
        );
    }
}
