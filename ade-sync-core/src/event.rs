//! Provider-neutral event types.
//!
//! Sources convert their schedule format into `CanonicalEvent`s, destinations
//! hand back `DestinationEvent`s, and the reconciler works exclusively with
//! these two types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::GOOGLE_API_APPNAME;
use crate::error::{CoreResult, SyncError};

/// Opaque marker stored in the destination's extended properties so the
/// engine can tell the events it manages from user-authored ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SyncTag(String);

impl SyncTag {
    pub fn new(tag: impl Into<String>) -> CoreResult<Self> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(SyncError::config("sync.tag", "must not be empty"));
        }
        Ok(SyncTag(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SyncTag {
    fn default() -> Self {
        SyncTag(GOOGLE_API_APPNAME.to_string())
    }
}

impl fmt::Display for SyncTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One scheduled occurrence, independent of where it came from.
///
/// Fields are private so that `start < end` and a non-empty `external_id`
/// hold for every value in circulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalEvent {
    external_id: String,
    title: String,
    location: Option<String>,
    description: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    sync_tag: Option<SyncTag>,
}

impl CanonicalEvent {
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let external_id = external_id.into();
        if external_id.trim().is_empty() {
            return Err(SyncError::SourceFormat("event has an empty external id".into()));
        }
        if start_time >= end_time {
            return Err(SyncError::SourceFormat(format!(
                "event '{}' ends ({}) before it starts ({})",
                external_id, end_time, start_time
            )));
        }

        Ok(CanonicalEvent {
            external_id,
            title: title.into(),
            location: None,
            description: None,
            start_time,
            end_time,
            last_modified: Utc::now(),
            sync_tag: None,
        })
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into()).filter(|l: &String| !l.is_empty());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into()).filter(|d: &String| !d.is_empty());
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn with_sync_tag(mut self, tag: SyncTag) -> Self {
        self.sync_tag = Some(tag);
        self
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn sync_tag(&self) -> Option<&SyncTag> {
        self.sync_tag.as_ref()
    }

    /// Whether this event carries the given engine tag.
    pub fn is_managed_by(&self, tag: &SyncTag) -> bool {
        self.sync_tag.as_ref() == Some(tag)
    }

    /// Compare the user-visible fields only (title, location, description,
    /// start, end). Identifiers, timestamps and the tag are ignored.
    pub fn content_eq(&self, other: &CanonicalEvent) -> bool {
        self.title == other.title
            && self.location == other.location
            && self.description == other.description
            && self.start_time == other.start_time
            && self.end_time == other.end_time
    }
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.start_time.format("%Y-%m-%d %H:%M"),
            self.external_id,
            self.title
        )
    }
}

/// A managed event as stored at the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationEvent {
    pub destination_id: String,
    pub event: CanonicalEvent,
}

impl DestinationEvent {
    pub fn new(destination_id: impl Into<String>, event: CanonicalEvent) -> Self {
        DestinationEvent {
            destination_id: destination_id.into(),
            event,
        }
    }

    pub fn external_id(&self) -> &str {
        self.event.external_id()
    }
}
