use std::sync::Arc;
use std::time::Duration;

use ade_sync_core::constants::{GOOGLE_API_APPNAME, GOOGLE_API_APPVERS};
use ade_sync_core::{
    CanonicalEvent, CoreResult, Destination, DestinationEvent, SyncError, SyncTag, TimeWindow,
    TokenProvider,
};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};
use url::Url;

use crate::api::{self, EventList, GoogleEvent, TAG_PROPERTY};
use crate::error;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

const PAGE_SIZE: &str = "250";

/// One Google calendar, accessed through the Calendar v3 REST API.
pub struct GoogleCalendar {
    client: reqwest::Client,
    base_url: Url,
    calendar_id: String,
    tokens: Arc<dyn TokenProvider>,
    name: String,
}

impl GoogleCalendar {
    pub fn new(
        calendar_id: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> CoreResult<Self> {
        let calendar_id = calendar_id.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("{GOOGLE_API_APPNAME}/{GOOGLE_API_APPVERS}"))
            .build()
            .map_err(|e| {
                SyncError::DestinationUnavailable(format!("HTTP client setup failed: {e}"))
            })?;

        Ok(GoogleCalendar {
            client,
            base_url: parse_base_url(DEFAULT_BASE_URL)?,
            name: format!("google:{calendar_id}"),
            calendar_id,
            tokens,
        })
    }

    /// Point the client at another API root (a proxy, or a test server).
    pub fn with_base_url(mut self, base_url: &str) -> CoreResult<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// `{base}/calendars/{calendarId}/events[/{eventId}]`
    fn events_url(&self, event_id: Option<&str>) -> CoreResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SyncError::config("google.base_url", "URL cannot carry a path")
            })?;
            segments
                .pop_if_empty()
                .extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Authorize and send `request`, turning non-2xx responses into errors.
    async fn send(&self, request: RequestBuilder) -> CoreResult<Response> {
        let token = self.tokens.get_valid_access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(error::transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        Err(error::classify(response).await)
    }

    fn body_for(&self, event: &CanonicalEvent) -> CoreResult<GoogleEvent> {
        let tag = event.sync_tag().ok_or_else(|| {
            SyncError::DestinationRejected(format!(
                "event '{}' carries no sync tag",
                event.external_id()
            ))
        })?;
        Ok(api::to_google(event, tag))
    }
}

fn parse_base_url(base_url: &str) -> CoreResult<Url> {
    Url::parse(base_url)
        .map_err(|e| SyncError::config("google.base_url", format!("invalid URL '{base_url}': {e}")))
}

#[async_trait]
impl Destination for GoogleCalendar {
    async fn list_managed_events(
        &self,
        tag: &SyncTag,
        window: &TimeWindow,
    ) -> CoreResult<Vec<DestinationEvent>> {
        let mut managed = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.events_url(None)?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair(
                        "timeMin",
                        &window.start().to_rfc3339_opts(SecondsFormat::Secs, true),
                    )
                    .append_pair(
                        "timeMax",
                        &window.end().to_rfc3339_opts(SecondsFormat::Secs, true),
                    )
                    .append_pair("singleEvents", "true")
                    .append_pair("showDeleted", "false")
                    .append_pair("maxResults", PAGE_SIZE)
                    .append_pair("privateExtendedProperty", &format!("{TAG_PROPERTY}={tag}"));
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page: EventList = self
                .send(self.client.get(url))
                .await?
                .json()
                .await
                .map_err(|e| {
                    SyncError::DestinationUnavailable(format!("unreadable event list: {e}"))
                })?;

            for item in page.items {
                let item_id = item.id.clone().unwrap_or_default();
                match api::from_google(item) {
                    Some(stored) if stored.event.is_managed_by(tag) => managed.push(stored),
                    Some(_) => debug!(destination_id = %item_id, "Skipping event with another tag"),
                    None => {
                        warn!(destination_id = %item_id, "Skipping event without sync metadata")
                    }
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(calendar = %self.calendar_id, count = managed.len(), "Listed managed events");
        Ok(managed)
    }

    async fn create(&self, event: &CanonicalEvent) -> CoreResult<String> {
        let body = self.body_for(event)?;
        let created: GoogleEvent = self
            .send(self.client.post(self.events_url(None)?).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| SyncError::DestinationUnavailable(format!("unreadable response: {e}")))?;

        created.id.ok_or_else(|| {
            SyncError::DestinationUnavailable("created event has no id".into())
        })
    }

    async fn update(&self, destination_id: &str, event: &CanonicalEvent) -> CoreResult<()> {
        let body = self.body_for(event)?;
        self.send(
            self.client
                .put(self.events_url(Some(destination_id))?)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, destination_id: &str) -> CoreResult<()> {
        self.send(self.client.delete(self.events_url(Some(destination_id))?))
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ade_sync_core::StaticToken;

    fn calendar(id: &str) -> GoogleCalendar {
        GoogleCalendar::new(id, Arc::new(StaticToken("t".into())), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_events_url_escapes_calendar_id() {
        let url = calendar("abc@group.calendar.google.com")
            .events_url(Some("evt1"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/abc@group.calendar.google.com/events/evt1"
        );

        let url = calendar("a/b#c").events_url(None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/a%2Fb%23c/events"
        );
    }

    #[test]
    fn test_base_url_with_trailing_slash() {
        let url = calendar("primary")
            .with_base_url("http://127.0.0.1:8080/")
            .unwrap()
            .events_url(None)
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/calendars/primary/events");
    }
}
