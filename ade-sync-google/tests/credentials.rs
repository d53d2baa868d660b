use std::path::{Path, PathBuf};

use ade_sync_core::{SyncError, TokenProvider};
use ade_sync_google::{FileCredentialStore, StoredCredentials};
use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    _dir: TempDir,
    secrets: PathBuf,
    credentials: PathBuf,
}

fn fixture(token_uri: &str, expires_in: Duration) -> Fixture {
    let dir = TempDir::new().unwrap();
    let secrets = dir.path().join("calendar-oauth2.json");
    let credentials = dir.path().join("credentials.json");

    std::fs::write(
        &secrets,
        json!({
            "installed": {
                "client_id": "client-id.apps.googleusercontent.com",
                "client_secret": "client-secret",
                "token_uri": token_uri
            }
        })
        .to_string(),
    )
    .unwrap();
    write_credentials(
        &credentials,
        &StoredCredentials {
            access_token: "old-access".into(),
            refresh_token: "the-refresh-token".into(),
            expires_at: Utc::now() + expires_in,
        },
    );

    Fixture {
        _dir: dir,
        secrets,
        credentials,
    }
}

fn write_credentials(path: &Path, credentials: &StoredCredentials) {
    std::fs::write(path, serde_json::to_string(credentials).unwrap()).unwrap();
}

fn read_credentials(path: &Path) -> StoredCredentials {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_valid_token_is_used_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let f = fixture(&format!("{}/token", server.uri()), Duration::hours(1));

    let store = FileCredentialStore::new(&f.secrets, &f.credentials);

    assert_eq!(store.get_valid_access_token().await.unwrap(), "old-access");
    assert_eq!(store.get_valid_access_token().await.unwrap(), "old-access");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=the-refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let f = fixture(&format!("{}/token", server.uri()), Duration::minutes(-5));

    let store = FileCredentialStore::new(&f.secrets, &f.credentials);

    assert_eq!(store.get_valid_access_token().await.unwrap(), "new-access");
    // cached from now on
    assert_eq!(store.get_valid_access_token().await.unwrap(), "new-access");

    let saved = read_credentials(&f.credentials);
    assert_eq!(saved.access_token, "new-access");
    assert_eq!(saved.refresh_token, "the-refresh-token");
    assert!(saved.expires_at > Utc::now() + Duration::minutes(50));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&f.credentials).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn test_token_close_to_expiry_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "expires_in": 3600,
            "refresh_token": "rotated-refresh-token"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let f = fixture(&format!("{}/token", server.uri()), Duration::seconds(20));

    let store = FileCredentialStore::new(&f.secrets, &f.credentials);

    assert_eq!(store.get_valid_access_token().await.unwrap(), "new-access");
    assert_eq!(
        read_credentials(&f.credentials).refresh_token,
        "rotated-refresh-token"
    );
}

#[tokio::test]
async fn test_rejected_refresh_is_auth_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;
    let f = fixture(&format!("{}/token", server.uri()), Duration::minutes(-5));

    let store = FileCredentialStore::new(&f.secrets, &f.credentials);
    let err = store.get_valid_access_token().await.unwrap_err();

    assert!(matches!(err, SyncError::AuthExpired(ref msg) if msg.contains("invalid_grant")));
    assert_eq!(read_credentials(&f.credentials).access_token, "old-access");
}

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    let f = fixture(&format!("{}/token", server.uri()), Duration::hours(1));

    let store = FileCredentialStore::new(&f.secrets, &f.credentials);
    assert_eq!(store.get_valid_access_token().await.unwrap(), "old-access");

    store.invalidate().await;

    assert_eq!(store.get_valid_access_token().await.unwrap(), "new-access");
}

#[tokio::test]
async fn test_missing_files_are_auth_expired() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(
        dir.path().join("calendar-oauth2.json"),
        dir.path().join("credentials.json"),
    );

    let err = store.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, SyncError::AuthExpired(_)));
}
