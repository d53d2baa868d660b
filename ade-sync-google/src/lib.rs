//! Google Calendar backend for ade-sync-core.
//!
//! [`GoogleCalendar`] talks to the Calendar v3 REST API and implements
//! [`Destination`](ade_sync_core::Destination). It keeps the sync tag and the
//! source's external id in each event's private extended properties.
//! [`FileCredentialStore`] supplies OAuth2 access tokens from the files
//! written at setup time, refreshing them when needed.

mod api;
mod calendar;
mod credentials;
mod error;

pub use calendar::{DEFAULT_BASE_URL, GoogleCalendar};
pub use credentials::{ClientSecrets, FileCredentialStore, StoredCredentials};
