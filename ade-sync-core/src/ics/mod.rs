//! iCalendar feed source.
//!
//! ADE publishes a timetable as an iCalendar export. This source downloads
//! (or reads) that export and turns each VEVENT into a [`CanonicalEvent`].

mod parse;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use tracing::debug;

use crate::config::AdeSettings;
use crate::constants::{GOOGLE_API_APPNAME, GOOGLE_API_APPVERS};
use crate::error::{CoreResult, SyncError};
use crate::event::CanonicalEvent;
use crate::source::Source;
use crate::time_window::TimeWindow;

pub use parse::parse_feed;

#[derive(Debug, Clone, PartialEq)]
enum FeedLocation {
    Http(String),
    File(PathBuf),
}

impl FeedLocation {
    fn parse(url: &str) -> CoreResult<Self> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(FeedLocation::Http(url.to_string()))
        } else if let Some(path) = url.strip_prefix("file://") {
            Ok(FeedLocation::File(PathBuf::from(path)))
        } else if url.contains("://") {
            Err(SyncError::config(
                "ade.url",
                format!("unsupported scheme in '{url}'"),
            ))
        } else {
            Ok(FeedLocation::File(PathBuf::from(url)))
        }
    }
}

/// [`Source`] reading an iCalendar document over HTTP(S) or from disk.
pub struct IcsFeedSource {
    location: FeedLocation,
    timezone: Tz,
    client: reqwest::Client,
    name: String,
}

impl IcsFeedSource {
    pub fn new(url: &str, timezone: Tz, timeout: Duration) -> CoreResult<Self> {
        let location = FeedLocation::parse(url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("{GOOGLE_API_APPNAME}/{GOOGLE_API_APPVERS}"))
            .build()
            .map_err(|e| SyncError::SourceUnavailable(format!("HTTP client setup failed: {e}")))?;

        Ok(IcsFeedSource {
            location,
            timezone,
            client,
            name: format!("ics:{url}"),
        })
    }

    pub fn from_settings(settings: &AdeSettings) -> CoreResult<Self> {
        Self::new(&settings.url, settings.timezone, settings.timeout)
    }

    async fn fetch_document(&self) -> CoreResult<String> {
        match &self.location {
            FeedLocation::Http(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| SyncError::SourceUnavailable(format!("GET {url}: {e}")))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(SyncError::SourceUnavailable(format!(
                        "GET {url} returned HTTP {status}"
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| SyncError::SourceUnavailable(format!("GET {url}: {e}")))
            }
            FeedLocation::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                SyncError::SourceUnavailable(format!("reading {}: {e}", path.display()))
            }),
        }
    }
}

#[async_trait]
impl Source for IcsFeedSource {
    async fn fetch_events(&self, window: &TimeWindow) -> CoreResult<Vec<CanonicalEvent>> {
        let fetched_at = Utc::now();
        let document = self.fetch_document().await?;
        let parsed = parse_feed(&document, self.timezone, fetched_at)?;

        let total = parsed.len();
        let events: Vec<_> = parsed
            .into_iter()
            .filter(|e| window.overlaps(e.start_time(), e.end_time()))
            .collect();

        debug!(
            source = %self.name,
            total,
            in_window = events.len(),
            "Parsed iCalendar feed"
        );
        Ok(events)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
