//! # Session Guard
//!
//! Every remote call made by the core goes through [`SessionGuard::call`].
//!
//! ## Behavior
//!
//! - Success is returned untouched.
//! - [`RemoteError::SessionExpired`] triggers one session re-establishment
//!   followed by exactly one retry of the same call. A second failure of any
//!   kind propagates unmodified.
//! - Every other error propagates immediately.
//!
//! Concurrent calls that hit an expired session renew it once: renewals are
//! serialized behind a mutex and a generation counter tells late arrivals
//! that the session they saw expire has already been replaced.
//!
//! ## Usage
//!
//! ```ignore
//! let guard = SessionGuard::new(client);
//! let playlist = guard
//!     .call("get_playlist", |client| async move { client.get_playlist(id).await })
//!     .await?;
//! ```

use crate::error::{AuthError, Result};
use bridge_traits::{RemoteError, RemoteMusicClient};
use core_runtime::logging::redact_if_sensitive;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Auth-retry wrapper around a [`RemoteMusicClient`].
pub struct SessionGuard {
    client: Arc<dyn RemoteMusicClient>,
    /// Held while a renewal is in flight
    renewal_lock: Mutex<()>,
    /// Bumped after every successful renewal
    generation: AtomicU64,
}

impl SessionGuard {
    pub fn new(client: Arc<dyn RemoteMusicClient>) -> Self {
        Self {
            client,
            renewal_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Number of successful renewals so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Run one remote call, renewing the session and retrying once on expiry.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut(Arc<dyn RemoteMusicClient>) -> Fut,
        Fut: Future<Output = bridge_traits::Result<T>>,
    {
        let seen = self.generation();

        match op(Arc::clone(&self.client)).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_session_expired() => {
                warn!(operation, "Remote session expired, renewing before retry");
                self.renew(operation, seen).await?;

                op(Arc::clone(&self.client)).await.map_err(|err| {
                    warn!(operation, error = %err, "Remote call failed after session renewal");
                    AuthError::Remote(err)
                })
            }
            Err(err) => {
                debug!(operation, error = %err, "Remote call failed");
                Err(AuthError::Remote(err))
            }
        }
    }

    async fn renew(&self, operation: &str, seen: u64) -> Result<()> {
        let _guard = self.renewal_lock.lock().await;

        if self.generation() != seen {
            debug!(operation, "Session already renewed by a concurrent call");
            return Ok(());
        }

        self.client
            .reestablish_session()
            .await
            .map_err(|source: RemoteError| {
                error!(
                    operation,
                    reason = %redact_if_sensitive("reason", &source.to_string()),
                    "Session renewal failed"
                );
                AuthError::SessionRenewalFailed {
                    operation: operation.to_string(),
                    source,
                }
            })?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(operation, generation, "Remote session re-established");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::remote::{
        AddTracksStatus, RemoteAlbum, RemoteArtist, RemoteHistoryItem, RemotePlaylist,
        RemotePlaylistSummary, RemoteSong,
    };
    use bridge_traits::Result as RemoteResult;
    use mockall::mock;
    use std::sync::atomic::AtomicBool;

    mock! {
        pub Remote {}

        #[async_trait]
        impl RemoteMusicClient for Remote {
            async fn get_library_playlists(&self) -> RemoteResult<Vec<RemotePlaylistSummary>>;
            async fn get_playlist(&self, playlist_id: &str) -> RemoteResult<RemotePlaylist>;
            async fn get_song(&self, song_id: &str) -> RemoteResult<RemoteSong>;
            async fn get_album(&self, album_id: &str) -> RemoteResult<RemoteAlbum>;
            async fn get_artist(&self, artist_id: &str) -> RemoteResult<RemoteArtist>;
            async fn get_recent_history(&self) -> RemoteResult<Vec<RemoteHistoryItem>>;
            async fn add_tracks(&self, playlist_id: &str, song_ids: &[String]) -> RemoteResult<Vec<AddTracksStatus>>;
            async fn remove_tracks(&self, playlist_id: &str, instance_ids: &[String]) -> RemoteResult<()>;
            async fn create_playlist(&self, title: &str, description: &str) -> RemoteResult<String>;
            async fn delete_playlist(&self, playlist_id: &str) -> RemoteResult<()>;
            async fn reestablish_session(&self) -> RemoteResult<()>;
        }
    }

    fn remote_song(id: &str) -> RemoteSong {
        RemoteSong {
            id: id.to_string(),
            title: format!("Song {}", id),
            artists: Vec::new(),
            album: None,
            duration_secs: None,
            explicit: false,
            is_local: false,
            thumbnails: Vec::new(),
        }
    }

    async fn fetch_song(guard: &SessionGuard) -> Result<RemoteSong> {
        guard
            .call("get_song", |client| async move { client.get_song("s1").await })
            .await
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let mut remote = MockRemote::new();
        remote
            .expect_get_song()
            .times(1)
            .returning(|id| Ok(remote_song(id)));
        remote.expect_reestablish_session().never();

        let guard = SessionGuard::new(Arc::new(remote));
        let song = fetch_song(&guard).await.unwrap();

        assert_eq!(song.id, "s1");
        assert_eq!(guard.generation(), 0);
    }

    #[tokio::test]
    async fn test_expired_session_renews_and_retries_once() {
        let renewed = Arc::new(AtomicBool::new(false));

        let mut remote = MockRemote::new();
        let seen = Arc::clone(&renewed);
        remote.expect_get_song().times(2).returning(move |id| {
            if seen.load(Ordering::SeqCst) {
                Ok(remote_song(id))
            } else {
                Err(RemoteError::SessionExpired)
            }
        });
        let flag = Arc::clone(&renewed);
        remote.expect_reestablish_session().times(1).returning(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        let guard = SessionGuard::new(Arc::new(remote));
        let song = fetch_song(&guard).await.unwrap();

        assert_eq!(song.id, "s1");
        assert_eq!(guard.generation(), 1);
    }

    #[tokio::test]
    async fn test_permanently_expired_session_does_not_loop() {
        let mut remote = MockRemote::new();
        remote
            .expect_get_song()
            .times(2)
            .returning(|_| Err(RemoteError::SessionExpired));
        remote.expect_reestablish_session().times(1).returning(|| Ok(()));

        let guard = SessionGuard::new(Arc::new(remote));
        let err = fetch_song(&guard).await.unwrap_err();

        assert_eq!(err, AuthError::Remote(RemoteError::SessionExpired));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let mut remote = MockRemote::new();
        remote
            .expect_get_song()
            .times(1)
            .returning(|id| Err(RemoteError::not_found("song", id)));
        remote.expect_reestablish_session().never();

        let guard = SessionGuard::new(Arc::new(remote));
        let err = fetch_song(&guard).await.unwrap_err();

        assert!(err.remote().is_not_found());
    }

    #[tokio::test]
    async fn test_failed_renewal_skips_retry() {
        let mut remote = MockRemote::new();
        remote
            .expect_get_song()
            .times(1)
            .returning(|_| Err(RemoteError::SessionExpired));
        remote
            .expect_reestablish_session()
            .times(1)
            .returning(|| Err(RemoteError::CredentialsUnavailable("no cookie".to_string())));

        let guard = SessionGuard::new(Arc::new(remote));
        let err = fetch_song(&guard).await.unwrap_err();

        assert!(matches!(err, AuthError::SessionRenewalFailed { .. }));
        assert_eq!(guard.generation(), 0);
    }

    #[tokio::test]
    async fn test_renewal_skipped_when_generation_moved_on() {
        let mut remote = MockRemote::new();
        remote.expect_reestablish_session().times(1).returning(|| Ok(()));

        let guard = SessionGuard::new(Arc::new(remote));
        guard.renew("first", 0).await.unwrap();
        // A call that observed generation 0 arrives after the renewal above.
        guard.renew("late", 0).await.unwrap();

        assert_eq!(guard.generation(), 1);
    }
}
