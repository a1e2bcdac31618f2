//! Bulk refresh of the mirrored library.

use crate::error::{CoreError, ErrorKind, Result};
use crate::CoreService;
use core_library::models::{ResourceType, HISTORY_PLAYLIST_ID};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// One item that could not be refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub resource_type: ResourceType,
    pub id: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl RefreshFailure {
    fn new(resource_type: ResourceType, id: &str, err: &CoreError) -> Self {
        Self {
            resource_type,
            id: id.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub playlists_refreshed: usize,
    pub albums_hydrated: usize,
    /// Playlists and albums left alone by the skip settings
    pub skipped: Vec<String>,
    pub failures: Vec<RefreshFailure>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl CoreService {
    /// Force-refresh the library, every playlist in it, and albums never
    /// fetched in full.
    ///
    /// Only a failure to list the library aborts the run; everything else is
    /// collected into the report.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        let mut report = RefreshReport::default();
        let settings = self.ctx.refresh.clone();

        let library = self.get_library(true).await?;

        for summary in library.iter().filter(|p| p.id != HISTORY_PLAYLIST_ID) {
            if settings.skips_playlist(&summary.id) {
                report.skipped.push(summary.id.clone());
                continue;
            }

            pause(settings.pause_between_calls).await;
            match self.get_playlist(&summary.id, true).await {
                Ok(_) => report.playlists_refreshed += 1,
                Err(err) => {
                    warn!(playlist_id = %summary.id, error = %err, "Playlist refresh failed");
                    report
                        .failures
                        .push(RefreshFailure::new(ResourceType::Playlist, &summary.id, &err));
                }
            }
        }

        let unhydrated = self
            .ctx
            .albums
            .find_unhydrated_ids()
            .await
            .map_err(|err| CoreError::store(ResourceType::Album, "*", err))?;

        for album_id in &unhydrated {
            if settings.skips_album(album_id) {
                report.skipped.push(album_id.clone());
                continue;
            }

            pause(settings.pause_between_calls).await;
            match self.get_album(album_id, true).await {
                Ok(_) => report.albums_hydrated += 1,
                Err(err) => {
                    warn!(album_id = %album_id, error = %err, "Album hydration failed");
                    report
                        .failures
                        .push(RefreshFailure::new(ResourceType::Album, album_id, &err));
                }
            }
        }

        info!(
            playlists = report.playlists_refreshed,
            albums = report.albums_hydrated,
            skipped = report.skipped.len(),
            failures = report.failures.len(),
            "Bulk refresh finished"
        );
        Ok(report)
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
