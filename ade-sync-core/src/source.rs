//! Schedule source seam.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::event::CanonicalEvent;
use crate::time_window::TimeWindow;

/// A read-only provider of scheduled events (e.g. an ADE timetable export).
///
/// Implementations return the events overlapping `window`, in a stable order,
/// with unique external ids. Failing to reach the provider is reported as
/// `SourceUnavailable`; data that cannot be turned into events as
/// `SourceFormat`.
#[async_trait]
pub trait Source: Send + Sync {
    async fn fetch_events(&self, window: &TimeWindow) -> CoreResult<Vec<CanonicalEvent>>;

    /// Short human-readable name used in logs.
    fn name(&self) -> &str;
}
