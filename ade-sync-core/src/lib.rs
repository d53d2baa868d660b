//! Core of the ADE → calendar synchronization engine.
//!
//! This crate owns everything that does not depend on a concrete calendar
//! backend:
//! - `event` and `time_window` for the provider-neutral event model
//! - `source` / `destination` / `auth` for the adapter seams
//! - `reconcile` for diffing a source snapshot against managed destination events
//! - `execute` for applying the resulting operations with retries
//! - `engine` for the full fetch → reconcile → execute pipeline
//! - `config` for loading `ade-ga-sync.yml`
//! - `ics` for the bundled iCalendar feed source

pub mod auth;
pub mod config;
pub mod constants;
pub mod destination;
pub mod engine;
pub mod error;
pub mod event;
pub mod execute;
pub mod ics;
pub mod reconcile;
pub mod source;
pub mod time_window;

pub use auth::{StaticToken, TokenProvider};
pub use crate::config::Configuration;
pub use destination::Destination;
pub use engine::{SyncEngine, run_sync};
pub use error::{CoreResult, SyncError};
pub use event::{CanonicalEvent, DestinationEvent, SyncTag};
pub use execute::{
    EntryFailure, EntryReport, Executor, Outcome, RetryPolicy, SkipReason, SyncResult, SyncSummary,
};
pub use ics::IcsFeedSource;
pub use reconcile::{Anomaly, OperationEntry, OperationKind, ReconcilePlan, Reconciler};
pub use source::Source;
pub use time_window::TimeWindow;
