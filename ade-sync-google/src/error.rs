//! Mapping of Calendar API failures onto [`SyncError`].

use std::time::Duration;

use ade_sync_core::SyncError;
use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode, header::RETRY_AFTER};

use crate::api::ApiErrorBody;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const RATE_LIMIT_REASONS: [&str; 2] = ["rateLimitExceeded", "userRateLimitExceeded"];

pub(crate) fn transport(err: reqwest::Error) -> SyncError {
    SyncError::DestinationUnavailable(format!("request failed: {err}"))
}

/// `Retry-After` as delta-seconds or as an HTTP-date. A date in the past
/// means no wait.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// Classify a non-2xx response.
pub(crate) async fn classify(response: Response) -> SyncError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| parse_retry_after(s, Utc::now()));

    let body = response.text().await.unwrap_or_default();
    let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let message = if parsed.error.message.is_empty() {
        status.to_string()
    } else {
        parsed.error.message.clone()
    };
    let rate_limited = parsed
        .error
        .errors
        .iter()
        .any(|e| RATE_LIMIT_REASONS.contains(&e.reason.as_str()));

    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => SyncError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => {
            SyncError::RateLimited(retry_after.unwrap_or(DEFAULT_RETRY_AFTER))
        }
        StatusCode::FORBIDDEN if rate_limited => {
            SyncError::RateLimited(retry_after.unwrap_or(DEFAULT_RETRY_AFTER))
        }
        StatusCode::UNAUTHORIZED => {
            SyncError::DestinationUnavailable(format!("unauthorized: {message}"))
        }
        s if s.is_server_error() => {
            SyncError::DestinationUnavailable(format!("HTTP {}: {message}", s.as_u16()))
        }
        s => SyncError::DestinationRejected(format!("HTTP {}: {message}", s.as_u16())),
    }
}
