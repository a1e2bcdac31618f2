//! Playlist editing through the remote service.
//!
//! Mutations go to the remote service first. Successful edits are folded
//! back into the mirror by force-refreshing the playlist, so the
//! reconciler records them like any other detected change. Failed attempts
//! are logged with `succeeded = false`.

use crate::error::{CoreError, Result};
use crate::CoreService;
use bridge_traits::AddTracksStatus;
use core_auth::AuthError;
use core_library::models::{
    ActionKind, ActionLogEntry, ActionOrigin, Playlist, ResourceType, TrackKey, HISTORY_PLAYLIST_ID, LIBRARY_ID,
};
use core_library::repositories::{cache, playlist, OnConflict};
use core_sync::audit::record_action;
use core_sync::Result as SyncResult;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Per-song result of [`CoreService::add_songs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSongsOutcome {
    pub added: Vec<String>,
    pub already_present: Vec<String>,
    pub failed: Vec<FailedAdd>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAdd {
    pub song_id: String,
    pub reason: String,
}

impl AddSongsOutcome {
    fn absorb(&mut self, song_ids: &[String], statuses: Vec<AddTracksStatus>) {
        let mut statuses = statuses.into_iter();
        for song_id in song_ids {
            match statuses.next() {
                Some(AddTracksStatus::Succeeded) => self.added.push(song_id.clone()),
                Some(AddTracksStatus::AlreadyPresent) => self.already_present.push(song_id.clone()),
                Some(AddTracksStatus::Failed(reason)) => self.fail(song_id, reason),
                None => self.fail(song_id, "no status reported".to_string()),
            }
        }
    }

    fn fail(&mut self, song_id: &str, reason: String) {
        self.failed.push(FailedAdd {
            song_id: song_id.to_string(),
            reason,
        });
    }
}

fn editable_playlist_id(playlist_id: &str) -> Result<()> {
    if playlist_id.trim().is_empty() {
        return Err(CoreError::InvalidInput("Playlist id cannot be empty".to_string()));
    }
    if playlist_id == HISTORY_PLAYLIST_ID {
        return Err(CoreError::InvalidInput("The history cannot be edited".to_string()));
    }
    Ok(())
}

impl CoreService {
    /// Create a playlist remotely and mirror its (empty) shell.
    #[instrument(skip(self, description))]
    pub async fn create_playlist(&self, title: &str, description: &str) -> Result<Playlist> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::InvalidInput("Playlist title cannot be empty".to_string()));
        }

        let id = self
            .ctx
            .session
            .call("create_playlist", |client| async move {
                client.create_playlist(title, description).await
            })
            .await
            .map_err(|source| CoreError::Remote {
                resource_type: ResourceType::Playlist,
                id: title.to_string(),
                source,
            })?;

        let mut created = Playlist::new(id.clone(), title);
        if !description.is_empty() {
            created.description = Some(description.to_string());
        }

        let entry = ActionLogEntry::for_playlist(
            ActionKind::CreatePlaylist,
            ActionOrigin::Remote,
            true,
            &id,
            Some(title),
            self.ctx.now_millis(),
        );
        self.store_created(&created, &entry)
            .await
            .map_err(|err| CoreError::for_resource(ResourceType::Playlist, &id, err))?;
        self.invalidate_library().await?;

        info!(playlist_id = %id, "Playlist created");
        Ok(created)
    }

    /// Delete a playlist remotely and locally.
    ///
    /// A playlist the remote service no longer knows is treated as deleted.
    #[instrument(skip(self))]
    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        editable_playlist_id(playlist_id)?;

        let title = self
            .ctx
            .playlists
            .find_by_id(playlist_id)
            .await
            .map_err(|err| CoreError::store(ResourceType::Playlist, playlist_id, err))?
            .map(|p| p.title);

        let remote = self
            .ctx
            .session
            .call("delete_playlist", |client| async move {
                client.delete_playlist(playlist_id).await
            })
            .await;

        match remote {
            Ok(()) => {}
            Err(AuthError::Remote(err)) if err.is_not_found() => {
                debug!("Playlist already gone remotely");
            }
            Err(source) => {
                let entry = ActionLogEntry::for_playlist(
                    ActionKind::DeletePlaylist,
                    ActionOrigin::Remote,
                    false,
                    playlist_id,
                    title.as_deref(),
                    self.ctx.now_millis(),
                );
                self.record_failure(&entry).await;
                return Err(CoreError::Remote {
                    resource_type: ResourceType::Playlist,
                    id: playlist_id.to_string(),
                    source,
                });
            }
        }

        let entry = ActionLogEntry::for_playlist(
            ActionKind::DeletePlaylist,
            ActionOrigin::Remote,
            true,
            playlist_id,
            title.as_deref(),
            self.ctx.now_millis(),
        );
        self.remove_local(playlist_id, &entry)
            .await
            .map_err(|err| CoreError::for_resource(ResourceType::Playlist, playlist_id, err))?;
        self.invalidate_library().await?;

        info!("Playlist deleted");
        Ok(())
    }

    /// Add songs to a playlist.
    ///
    /// Songs not yet in the playlist go out in one batch. Songs that may
    /// already be there are sent one at a time so each gets its own status.
    #[instrument(skip(self, song_ids), fields(count = song_ids.len()))]
    pub async fn add_songs(&self, playlist_id: &str, song_ids: &[String]) -> Result<AddSongsOutcome> {
        editable_playlist_id(playlist_id)?;
        let mut outcome = AddSongsOutcome::default();
        if song_ids.is_empty() {
            return Ok(outcome);
        }

        let present = self
            .ctx
            .playlists
            .song_ids(playlist_id)
            .await
            .map_err(|err| CoreError::store(ResourceType::Playlist, playlist_id, err))?;
        let (maybe_present, absent): (Vec<String>, Vec<String>) =
            song_ids.iter().cloned().partition(|id| present.contains(id));

        if !absent.is_empty() {
            let batch = absent.as_slice();
            match self
                .ctx
                .session
                .call("add_tracks", |client| async move { client.add_tracks(playlist_id, batch).await })
                .await
            {
                Ok(statuses) => outcome.absorb(batch, statuses),
                Err(err) => {
                    warn!(error = %err, "Batch add failed");
                    for song_id in batch {
                        outcome.fail(song_id, err.to_string());
                    }
                }
            }
        }

        for song_id in &maybe_present {
            let single = std::slice::from_ref(song_id);
            match self
                .ctx
                .session
                .call("add_tracks", |client| async move { client.add_tracks(playlist_id, single).await })
                .await
            {
                Ok(statuses) => outcome.absorb(single, statuses),
                Err(err) => outcome.fail(song_id, err.to_string()),
            }
        }

        if !outcome.failed.is_empty() {
            let title = self.stored_title(playlist_id).await;
            for failure in &outcome.failed {
                let entry = self.song_entry(ActionKind::AddSong, playlist_id, title.as_deref(), &failure.song_id, None).await;
                self.record_failure(&entry).await;
            }
        }

        if !outcome.added.is_empty() {
            self.playlists.get(&self.ctx, playlist_id, &(), true).await?;
        }

        info!(
            added = outcome.added.len(),
            already_present = outcome.already_present.len(),
            failed = outcome.failed.len(),
            "Songs added"
        );
        Ok(outcome)
    }

    /// Remove tracks from a playlist and return the refreshed playlist.
    #[instrument(skip(self, keys), fields(count = keys.len()))]
    pub async fn remove_songs(&self, playlist_id: &str, keys: &[TrackKey]) -> Result<Playlist> {
        editable_playlist_id(playlist_id)?;
        if keys.is_empty() {
            return Err(CoreError::InvalidInput("No tracks to remove".to_string()));
        }

        let instance_ids: Vec<String> = keys.iter().map(|key| key.instance_id.clone()).collect();
        let instance_ids = instance_ids.as_slice();
        let remote = self
            .ctx
            .session
            .call("remove_tracks", |client| async move {
                client.remove_tracks(playlist_id, instance_ids).await
            })
            .await;

        if let Err(source) = remote {
            let title = self.stored_title(playlist_id).await;
            for key in keys {
                let entry = self
                    .song_entry(
                        ActionKind::RemoveSong,
                        playlist_id,
                        title.as_deref(),
                        &key.stable_id,
                        Some(&key.instance_id),
                    )
                    .await;
                self.record_failure(&entry).await;
            }
            return Err(CoreError::Remote {
                resource_type: ResourceType::Playlist,
                id: playlist_id.to_string(),
                source,
            });
        }

        self.playlists.get(&self.ctx, playlist_id, &(), true).await
    }

    async fn store_created(&self, created: &Playlist, entry: &ActionLogEntry) -> SyncResult<()> {
        let mut tx = self.ctx.pool.begin().await?;
        playlist::save_playlist_metadata(&mut tx, created, OnConflict::DoNothing).await?;
        record_action(&mut tx, &self.ctx.session, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_local(&self, playlist_id: &str, entry: &ActionLogEntry) -> SyncResult<()> {
        let mut tx = self.ctx.pool.begin().await?;
        playlist::delete_playlist(&mut tx, playlist_id).await?;
        cache::delete_record(&mut tx, playlist_id, ResourceType::Playlist).await?;
        record_action(&mut tx, &self.ctx.session, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn invalidate_library(&self) -> Result<()> {
        self.ctx
            .freshness
            .invalidate(LIBRARY_ID, ResourceType::Library)
            .await
            .map_err(|err| CoreError::store(ResourceType::Library, LIBRARY_ID, err))?;
        Ok(())
    }

    async fn stored_title(&self, playlist_id: &str) -> Option<String> {
        match self.ctx.playlists.find_by_id(playlist_id).await {
            Ok(found) => found.map(|p| p.title),
            Err(err) => {
                warn!(error = %err, "Could not read playlist title");
                None
            }
        }
    }

    /// Audit entry for a failed song edit, titled from the stored song if known.
    async fn song_entry(
        &self,
        kind: ActionKind,
        playlist_id: &str,
        playlist_title: Option<&str>,
        song_id: &str,
        instance_id: Option<&str>,
    ) -> ActionLogEntry {
        let now = self.ctx.now_millis();
        match self.ctx.songs.find_by_id(song_id).await {
            Ok(Some(song)) => ActionLogEntry::for_song(
                kind,
                ActionOrigin::Remote,
                false,
                (playlist_id, playlist_title),
                &song,
                instance_id,
                now,
            ),
            _ => {
                let mut entry =
                    ActionLogEntry::for_playlist(kind, ActionOrigin::Remote, false, playlist_id, playlist_title, now);
                entry.song_id = Some(song_id.to_string());
                entry.instance_id = instance_id.map(str::to_string);
                entry
            }
        }
    }

    /// Log a failed attempt; the attempt's own error is what the caller sees.
    async fn record_failure(&self, entry: &ActionLogEntry) {
        let result: SyncResult<i64> = async {
            let mut conn = self.ctx.pool.acquire().await?;
            record_action(&mut conn, &self.ctx.session, entry).await
        }
        .await;

        if let Err(err) = result {
            warn!(kind = entry.kind.as_str(), error = %err, "Could not record failed action");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_aligns_statuses_with_ids() {
        let ids: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let mut outcome = AddSongsOutcome::default();

        outcome.absorb(
            &ids,
            vec![
                AddTracksStatus::Succeeded,
                AddTracksStatus::AlreadyPresent,
                AddTracksStatus::Failed("region locked".to_string()),
            ],
        );

        assert_eq!(outcome.added, vec!["a".to_string()]);
        assert_eq!(outcome.already_present, vec!["b".to_string()]);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed[0].reason, "region locked");
        assert_eq!(outcome.failed[1].song_id, "d");
    }

    #[test]
    fn test_history_is_not_editable() {
        assert!(editable_playlist_id(HISTORY_PLAYLIST_ID).is_err());
        assert!(editable_playlist_id(" ").is_err());
        assert!(editable_playlist_id("PL1").is_ok());
    }
}
