//! Calendar v3 wire types and conversion from/to the engine's event model.

use std::collections::BTreeMap;

use ade_sync_core::{CanonicalEvent, DestinationEvent, SyncTag};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Private extended property holding the sync tag.
pub const TAG_PROPERTY: &str = "adeSyncTag";
/// Private extended property holding the source's external id.
pub const EXTERNAL_ID_PROPERTY: &str = "adeExternalId";
/// Private extended property holding the source's modification time.
pub const LAST_MODIFIED_PROPERTY: &str = "adeLastModified";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<ExtendedProperties>,
    #[serde(skip_serializing)]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl EventDateTime {
    fn instant(&self) -> Option<DateTime<Utc>> {
        self.date_time.or_else(|| {
            self.date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorItem {
    #[serde(default)]
    pub reason: String,
}

/// Request body for creating or replacing `event` under `tag`.
pub fn to_google(event: &CanonicalEvent, tag: &SyncTag) -> GoogleEvent {
    let private = BTreeMap::from([
        (TAG_PROPERTY.to_string(), tag.to_string()),
        (EXTERNAL_ID_PROPERTY.to_string(), event.external_id().to_string()),
        (
            LAST_MODIFIED_PROPERTY.to_string(),
            event
                .last_modified()
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    ]);

    GoogleEvent {
        id: None,
        summary: Some(event.title().to_string()),
        location: event.location().map(str::to_string),
        description: event.description().map(str::to_string),
        start: Some(EventDateTime {
            date_time: Some(event.start_time()),
            date: None,
        }),
        end: Some(EventDateTime {
            date_time: Some(event.end_time()),
            date: None,
        }),
        extended_properties: Some(ExtendedProperties { private }),
        updated: None,
    }
}

/// Read a listed item back as a managed event.
///
/// Items missing the id, the tag, the external id or valid times cannot be
/// managed and yield `None`.
pub fn from_google(item: GoogleEvent) -> Option<DestinationEvent> {
    let id = item.id?;
    let private = item.extended_properties.map(|p| p.private).unwrap_or_default();

    let tag = private.get(TAG_PROPERTY).and_then(|t| SyncTag::new(t.as_str()).ok())?;
    let external_id = private.get(EXTERNAL_ID_PROPERTY)?;
    let start = item.start.as_ref().and_then(EventDateTime::instant)?;
    let end = item.end.as_ref().and_then(EventDateTime::instant)?;

    let last_modified = private
        .get(LAST_MODIFIED_PROPERTY)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or(item.updated)
        .unwrap_or_else(Utc::now);

    let mut event = match CanonicalEvent::new(
        external_id.as_str(),
        item.summary.unwrap_or_default(),
        start,
        end,
    ) {
        Ok(event) => event,
        Err(err) => {
            warn!(destination_id = %id, error = %err, "Ignoring unreadable calendar event");
            return None;
        }
    };
    event = event.with_last_modified(last_modified).with_sync_tag(tag);
    if let Some(location) = item.location {
        event = event.with_location(location);
    }
    if let Some(description) = item.description {
        event = event.with_description(description);
    }

    Some(DestinationEvent::new(id, event))
}
