//! Applying a reconcile plan to a destination.
//!
//! Creates and updates run first, deletes second, each phase on a bounded
//! pool of tokio tasks. Every entry ends with exactly one [`EntryReport`];
//! destination errors never abort the batch.

mod executor;
mod report;
mod retry;

pub use executor::Executor;
pub use report::{EntryFailure, EntryReport, Outcome, SkipReason, SyncResult, SyncSummary};
pub use retry::RetryPolicy;
