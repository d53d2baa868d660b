//! File names and identifiers shared by every component.

/// Google API client secret bundle, as downloaded from the Cloud console.
pub const SECRETS_STORE_FILE: &str = "calendar-oauth2.json";

/// Persisted access/refresh token pair.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Application name announced to the Google API, also the default sync tag.
pub const GOOGLE_API_APPNAME: &str = "google-agenda-ade-sync";
pub const GOOGLE_API_APPVERS: &str = env!("CARGO_PKG_VERSION");

/// Configuration file looked up in the working directory, then in the
/// platform config directory.
pub const CONFIGURATION_FILE: &str = "ade-ga-sync.yml";

/// Number of days before today included in the default window.
pub const DEFAULT_PAST_DAYS: i64 = 7;

/// Number of days after today included in the default window.
pub const DEFAULT_FUTURE_DAYS: i64 = 120;
