//! Diffing a source snapshot against the managed destination events.

mod operation;
mod reconciler;

pub use operation::{OperationEntry, OperationKind};
pub use reconciler::{Anomaly, ReconcilePlan, Reconciler};
