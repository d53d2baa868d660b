//! Loading and validating `ade-ga-sync.yml`.
//!
//! The file is optional key by key: anything left out falls back to the
//! defaults below, except `ade.url` which has no sensible default. Every key
//! can also be set from the environment, e.g. `ADE_GA_SYNC__SYNC__WORKERS=8`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use ::config::{Config, Environment, File, Map};
use serde::Deserialize;

use crate::constants::{
    CONFIGURATION_FILE, CREDENTIALS_FILE, DEFAULT_FUTURE_DAYS, DEFAULT_PAST_DAYS,
    SECRETS_STORE_FILE,
};
use crate::engine::DEFAULT_WORKERS;
use crate::error::{CoreResult, SyncError};
use crate::event::SyncTag;
use crate::execute::RetryPolicy;
use crate::time_window::TimeWindow;

const ENV_PREFIX: &str = "ADE_GA_SYNC";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CALENDAR_ID: &str = "primary";

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfiguration {
    ade: RawAde,
    google: RawGoogle,
    sync: RawSync,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawAde {
    url: Option<String>,
    timezone: Option<String>,
    timeout: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawGoogle {
    calendar_id: Option<String>,
    secrets_file: Option<String>,
    credentials_file: Option<String>,
    timeout: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawSync {
    tag: Option<String>,
    past_days: Option<i64>,
    future_days: Option<i64>,
    workers: Option<usize>,
    max_retries: Option<u32>,
    base_delay: Option<String>,
    max_delay: Option<String>,
}

/// Where the schedule comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct AdeSettings {
    /// `http(s)://` or `file://` URL, or a filesystem path.
    pub url: String,
    /// Zone for floating times and all-day dates.
    pub timezone: Tz,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoogleSettings {
    pub calendar_id: String,
    pub secrets_file: PathBuf,
    pub credentials_file: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub tag: SyncTag,
    pub past_days: i64,
    pub future_days: i64,
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl SyncSettings {
    /// Window for a run, with optional YYYY-MM-DD overrides.
    pub fn window(&self, from: Option<&str>, to: Option<&str>) -> CoreResult<TimeWindow> {
        TimeWindow::from_args(from, to, self.past_days, self.future_days)
    }
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// File the configuration was read from.
    pub path: PathBuf,
    pub ade: AdeSettings,
    pub google: GoogleSettings,
    pub sync: SyncSettings,
}

impl Configuration {
    /// Locate and load the configuration file.
    ///
    /// Lookup order: `explicit`, then `./ade-ga-sync.yml`, then
    /// `<config dir>/ade-ga-sync/ade-ga-sync.yml`.
    pub fn load(explicit: Option<&Path>) -> CoreResult<Self> {
        let path = Self::discover(explicit)?;
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> CoreResult<Self> {
        load_with_env(path, None)
    }

    pub fn discover(explicit: Option<&Path>) -> CoreResult<PathBuf> {
        if let Some(path) = explicit {
            let expanded = expand(&path.to_string_lossy());
            if !expanded.is_file() {
                return Err(SyncError::config(
                    "config",
                    format!("file not found: {}", expanded.display()),
                ));
            }
            return Ok(expanded);
        }

        let local = PathBuf::from(CONFIGURATION_FILE);
        if local.is_file() {
            return Ok(local);
        }

        let global = Self::default_path()?;
        if global.is_file() {
            return Ok(global);
        }

        Err(SyncError::config(
            "config",
            format!(
                "no {} found in the current directory or at {}",
                CONFIGURATION_FILE,
                global.display()
            ),
        ))
    }

    /// `<config dir>/ade-ga-sync/ade-ga-sync.yml`
    pub fn default_path() -> CoreResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyncError::config("config", "could not determine config directory"))?
            .join("ade-ga-sync");

        Ok(config_dir.join(CONFIGURATION_FILE))
    }
}

fn load_with_env(path: &Path, env: Option<Map<String, String>>) -> CoreResult<Configuration> {
    let raw: RawConfiguration = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .map_err(|e| SyncError::config("config", e.to_string()))?
        .try_deserialize()
        .map_err(|e| SyncError::config("config", e.to_string()))?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    validate(raw, path.to_path_buf(), &base_dir)
}

fn validate(raw: RawConfiguration, path: PathBuf, base_dir: &Path) -> CoreResult<Configuration> {
    let url = raw
        .ade
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| SyncError::config("ade.url", "is required"))?;
    let url = if url.contains("://") {
        url
    } else {
        resolve(base_dir, &url).to_string_lossy().into_owned()
    };

    let timezone = match raw.ade.timezone {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| SyncError::config("ade.timezone", format!("unknown time zone '{name}'")))?,
        None => Tz::UTC,
    };

    let ade = AdeSettings {
        url,
        timezone,
        timeout: duration("ade.timeout", raw.ade.timeout, DEFAULT_TIMEOUT)?,
    };

    let calendar_id = raw
        .google
        .calendar_id
        .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string());
    if calendar_id.trim().is_empty() {
        return Err(SyncError::config("google.calendar_id", "must not be empty"));
    }

    let google = GoogleSettings {
        calendar_id,
        secrets_file: resolve(
            base_dir,
            raw.google.secrets_file.as_deref().unwrap_or(SECRETS_STORE_FILE),
        ),
        credentials_file: resolve(
            base_dir,
            raw.google
                .credentials_file
                .as_deref()
                .unwrap_or(CREDENTIALS_FILE),
        ),
        timeout: duration("google.timeout", raw.google.timeout, DEFAULT_TIMEOUT)?,
    };

    let tag = match raw.sync.tag {
        Some(tag) => SyncTag::new(tag)?,
        None => SyncTag::default(),
    };

    let past_days = raw.sync.past_days.unwrap_or(DEFAULT_PAST_DAYS);
    if past_days < 0 {
        return Err(SyncError::config("sync.past_days", "must not be negative"));
    }
    let future_days = raw.sync.future_days.unwrap_or(DEFAULT_FUTURE_DAYS);
    if future_days < 0 {
        return Err(SyncError::config("sync.future_days", "must not be negative"));
    }
    if past_days + future_days == 0 {
        return Err(SyncError::config(
            "sync.future_days",
            "window is empty, past_days and future_days are both 0",
        ));
    }

    let workers = raw.sync.workers.unwrap_or(DEFAULT_WORKERS);
    if workers == 0 {
        return Err(SyncError::config("sync.workers", "must be at least 1"));
    }

    let defaults = RetryPolicy::default();
    let retry = RetryPolicy {
        max_retries: raw.sync.max_retries.unwrap_or(defaults.max_retries),
        base_delay: duration("sync.base_delay", raw.sync.base_delay, defaults.base_delay)?,
        max_delay: duration("sync.max_delay", raw.sync.max_delay, defaults.max_delay)?,
    };
    if retry.base_delay.is_zero() {
        return Err(SyncError::config("sync.base_delay", "must be greater than 0"));
    }
    if retry.max_delay < retry.base_delay {
        return Err(SyncError::config(
            "sync.max_delay",
            "must not be shorter than sync.base_delay",
        ));
    }

    Ok(Configuration {
        path,
        ade,
        google,
        sync: SyncSettings {
            tag,
            past_days,
            future_days,
            workers,
            retry,
        },
    })
}

fn duration(field: &str, value: Option<String>, default: Duration) -> CoreResult<Duration> {
    match value {
        Some(s) => humantime::parse_duration(&s)
            .map_err(|e| SyncError::config(field, format!("invalid duration '{s}': {e}"))),
        None => Ok(default),
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Expand `~` and resolve relative paths against the config file directory.
fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let expanded = expand(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    }
}
