use core_auth::AuthError;
use core_library::LibraryError;
use std::future::Future;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store error: {0}")]
    Library(#[from] LibraryError),

    #[error("Remote error: {0}")]
    Remote(#[from] AuthError),

    #[error("Song {song_id} is referenced but could not be fetched: {source}")]
    DanglingReference {
        song_id: String,
        #[source]
        source: AuthError,
    },

    #[error("Malformed snapshot of playlist {playlist_id}: {reason}")]
    MalformedSnapshot { playlist_id: String, reason: String },
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Library(err) if err.is_transient())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Library(LibraryError::Database(err))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Re-run a multi-step store operation once if it failed transiently.
///
/// Each attempt is expected to open and commit its own transaction, so a
/// failed first attempt has been rolled back before the second starts.
pub async fn with_transient_retry<T, F, Fut>(operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(err) if err.is_transient() => {
            warn!(operation, error = %err, "Transient store error, re-running once");
            op().await
        }
        other => other,
    }
}
