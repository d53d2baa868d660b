//! Calendar destination seam.
//!
//! A destination is any mutable calendar store that can keep an opaque tag
//! and the source's external id alongside each event (Google Calendar keeps
//! them in private extended properties). The engine never keeps a local copy
//! of what it synced before: the tagged events at the destination are the
//! record.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::event::{CanonicalEvent, DestinationEvent, SyncTag};
use crate::time_window::TimeWindow;

#[async_trait]
pub trait Destination: Send + Sync {
    /// List the events carrying `tag` within `window`.
    ///
    /// Events authored by users (no tag, or another tag) must not be returned.
    async fn list_managed_events(
        &self,
        tag: &SyncTag,
        window: &TimeWindow,
    ) -> CoreResult<Vec<DestinationEvent>>;

    /// Create an event and return the identifier assigned by the destination.
    ///
    /// Fails with `DestinationRejected` on validation errors and
    /// `DestinationUnavailable` on transient connectivity or auth failures.
    async fn create(&self, event: &CanonicalEvent) -> CoreResult<String>;

    /// Replace the event stored under `destination_id`.
    ///
    /// Fails with `NotFound` if it no longer exists.
    async fn update(&self, destination_id: &str, event: &CanonicalEvent) -> CoreResult<()>;

    /// Remove the event stored under `destination_id`.
    ///
    /// `NotFound` may be returned; callers treat it as success.
    async fn delete(&self, destination_id: &str) -> CoreResult<()>;

    /// Short human-readable name used in logs.
    fn name(&self) -> &str;
}
