//! Credential seam between the engine and authenticated adapters.

use async_trait::async_trait;

use crate::error::CoreResult;

/// Supplies a bearer token that is valid at the time of the call.
///
/// Implementations refresh transparently and fail with
/// [`SyncError::AuthExpired`](crate::SyncError::AuthExpired) when the refresh
/// itself fails; there is no interactive re-authentication mid-run.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_valid_access_token(&self) -> CoreResult<String>;

    /// Drop any cached token so that the next call refreshes.
    ///
    /// Called by adapters after the remote rejected a token it had accepted
    /// before (HTTP 401).
    async fn invalidate(&self) {}
}

/// Fixed token, for tests and for tokens minted outside this process.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn get_valid_access_token(&self) -> CoreResult<String> {
        Ok(self.0.clone())
    }
}
