//! File-backed OAuth2 credentials.
//!
//! Two files are involved:
//! - the client secret bundle downloaded from the Google Cloud console
//!   (`calendar-oauth2.json`, `{"installed": {...}}` or `{"web": {...}}`)
//! - the persisted tokens (`credentials.json`), rewritten on every refresh

use std::path::{Path, PathBuf};

use ade_sync_core::config::GoogleSettings;
use ade_sync_core::{CoreResult, SyncError, TokenProvider};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this margin are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth2 client identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

/// Tokens persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredCredentials {
    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Default)]
struct Cache {
    credentials: Option<StoredCredentials>,
    /// Set when the API rejected the cached token.
    stale: bool,
}

/// [`TokenProvider`] backed by the secret bundle and token files.
///
/// Concurrent callers share one cached token; the first caller to find it
/// expired refreshes it while the others wait.
pub struct FileCredentialStore {
    secrets_path: PathBuf,
    credentials_path: PathBuf,
    client: reqwest::Client,
    cache: Mutex<Cache>,
}

impl FileCredentialStore {
    pub fn new(secrets_path: impl Into<PathBuf>, credentials_path: impl Into<PathBuf>) -> Self {
        FileCredentialStore {
            secrets_path: secrets_path.into(),
            credentials_path: credentials_path.into(),
            client: reqwest::Client::new(),
            cache: Mutex::new(Cache::default()),
        }
    }

    pub fn from_settings(settings: &GoogleSettings) -> Self {
        Self::new(&settings.secrets_file, &settings.credentials_file)
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    async fn load_secrets(&self) -> CoreResult<ClientSecrets> {
        let contents = read(&self.secrets_path).await?;
        let file: SecretsFile = serde_json::from_str(&contents).map_err(|e| {
            SyncError::AuthExpired(format!(
                "failed to parse client secrets {}: {e}",
                self.secrets_path.display()
            ))
        })?;

        file.installed.or(file.web).ok_or_else(|| {
            SyncError::AuthExpired(format!(
                "{} has neither an \"installed\" nor a \"web\" section",
                self.secrets_path.display()
            ))
        })
    }

    async fn load_credentials(&self) -> CoreResult<StoredCredentials> {
        let contents = read(&self.credentials_path).await?;
        serde_json::from_str(&contents).map_err(|e| {
            SyncError::AuthExpired(format!(
                "failed to parse credentials {}: {e}",
                self.credentials_path.display()
            ))
        })
    }

    async fn save(&self, credentials: &StoredCredentials) -> std::io::Result<()> {
        let contents = serde_json::to_string_pretty(credentials)?;

        if let Some(parent) = self.credentials_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.credentials_path, contents).await?;

        // Owner-only, the file holds OAuth tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(
                &self.credentials_path,
                std::fs::Permissions::from_mode(0o600),
            )
            .await?;
        }

        Ok(())
    }

    async fn refresh(&self, current: &StoredCredentials) -> CoreResult<StoredCredentials> {
        let secrets = self.load_secrets().await?;

        let response = self
            .client
            .post(&secrets.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("refresh_token", current.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::AuthExpired(format!("token refresh failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::AuthExpired(format!(
                "token refresh rejected (HTTP {}): {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| SyncError::AuthExpired(format!("unreadable token response: {e}")))?;

        Ok(StoredCredentials {
            access_token: refreshed.access_token,
            // Google usually omits the refresh token on refresh
            refresh_token: refreshed
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| current.refresh_token.clone()),
            expires_at: Utc::now() + Duration::seconds(refreshed.expires_in.unwrap_or(3600)),
        })
    }
}

async fn read(path: &Path) -> CoreResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SyncError::AuthExpired(format!("cannot read {}: {e}", path.display())))
}

#[async_trait]
impl TokenProvider for FileCredentialStore {
    async fn get_valid_access_token(&self) -> CoreResult<String> {
        let mut cache = self.cache.lock().await;

        let current = match cache.credentials.take() {
            Some(credentials) => credentials,
            None => self.load_credentials().await?,
        };

        if !cache.stale && !current.needs_refresh(Utc::now()) {
            let token = current.access_token.clone();
            cache.credentials = Some(current);
            return Ok(token);
        }

        debug!(expires_at = %current.expires_at, "Refreshing Google access token");
        let refreshed = match self.refresh(&current).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                cache.credentials = Some(current);
                return Err(err);
            }
        };

        if let Err(err) = self.save(&refreshed).await {
            warn!(
                path = %self.credentials_path.display(),
                error = %err,
                "Could not persist refreshed credentials"
            );
        } else {
            info!(path = %self.credentials_path.display(), "Saved refreshed credentials");
        }

        let token = refreshed.access_token.clone();
        cache.credentials = Some(refreshed);
        cache.stale = false;
        Ok(token)
    }

    async fn invalidate(&self) {
        self.cache.lock().await.stale = true;
    }
}
