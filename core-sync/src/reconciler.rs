//! # Playlist Reconciliation
//!
//! Merges a freshly fetched remote snapshot of a playlist into the stored
//! copy without dropping membership rows that did not change.
//!
//! ## Identity
//!
//! A track is identified by the composite [`TrackKey`] (song id, instance
//! id). The remote service may hand an instance id that used to belong to
//! one song to a different song, so a track only counts as "the same" when
//! both halves match. A reused instance id is therefore one removal plus one
//! addition, never an update.
//!
//! ## Apply order
//!
//! Inside one transaction:
//! 1. Playlist metadata is written (overwrite; titles change remotely).
//! 2. Removed tracks are deleted, one `RemoveSong` audit entry each.
//! 3. Added tracks are inserted after their song, album and artists are
//!    inserted if absent, one `AddSong` audit entry each.
//! 4. Retained tracks whose position moved get their position updated, with
//!    no audit entry.
//!
//! The caller marks the playlist refreshed only after this returns `Ok`.

use crate::audit::record_action;
use crate::error::{with_transient_retry, Result, SyncError};
use bridge_traits::time::Clock;
use core_auth::SessionGuard;
use core_library::models::{ActionKind, ActionLogEntry, ActionOrigin, Playlist, Track, TrackKey};
use core_library::repositories::{playlist, song, OnConflict};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Result of comparing a stored playlist with a remote snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// In the stored copy only, in stored order
    pub removed: Vec<TrackKey>,
    /// In the snapshot only, in snapshot order
    pub added: Vec<TrackKey>,
    /// In both, in snapshot order
    pub retained: Vec<TrackKey>,
    /// Retained tracks whose position changed
    pub reindexed: Vec<TrackKey>,
}

impl ChangeSet {
    /// True when applying this change set writes nothing.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.reindexed.is_empty()
    }
}

/// Compare two track lists by composite key.
pub fn compute_change_set(local: &[Track], remote: &[Track]) -> ChangeSet {
    let local_positions: HashMap<TrackKey, i64> =
        local.iter().map(|track| (track.key(), track.position)).collect();
    let remote_keys: HashSet<TrackKey> = remote.iter().map(Track::key).collect();

    let mut changes = ChangeSet {
        removed: local
            .iter()
            .map(Track::key)
            .filter(|key| !remote_keys.contains(key))
            .collect(),
        ..ChangeSet::default()
    };

    for track in remote {
        let key = track.key();
        match local_positions.get(&key) {
            None => changes.added.push(key),
            Some(&position) => {
                if position != track.position {
                    changes.reindexed.push(key.clone());
                }
                changes.retained.push(key);
            }
        }
    }

    changes
}

/// Applies remote playlist snapshots to the store.
pub struct PlaylistReconciler {
    pool: SqlitePool,
    guard: Arc<SessionGuard>,
    clock: Arc<dyn Clock>,
}

impl PlaylistReconciler {
    pub fn new(pool: SqlitePool, guard: Arc<SessionGuard>, clock: Arc<dyn Clock>) -> Self {
        Self { pool, guard, clock }
    }

    /// Reconcile the stored copy of `snapshot.id` with `snapshot`.
    ///
    /// Track positions are taken from the snapshot as given. A snapshot that
    /// repeats an instance id is rejected before anything is written.
    #[instrument(skip(self, snapshot), fields(playlist_id = %snapshot.id, tracks = snapshot.tracks.len()))]
    pub async fn reconcile(&self, snapshot: &Playlist) -> Result<ChangeSet> {
        snapshot
            .validate()
            .map_err(|reason| SyncError::MalformedSnapshot {
                playlist_id: snapshot.id.clone(),
                reason,
            })?;

        let changes = with_transient_retry("reconcile_playlist", || async move { self.apply(snapshot).await }).await?;

        info!(
            removed = changes.removed.len(),
            added = changes.added.len(),
            reindexed = changes.reindexed.len(),
            "Playlist reconciled"
        );
        Ok(changes)
    }

    async fn apply(&self, snapshot: &Playlist) -> Result<ChangeSet> {
        let mut tx = self.pool.begin().await?;

        let local = playlist::load_tracks(&mut tx, &snapshot.id).await?;
        let changes = compute_change_set(&local, &snapshot.tracks);
        debug!(stored = local.len(), "Loaded stored tracks");
        let now = self.clock.unix_timestamp_millis();

        playlist::save_playlist_metadata(&mut tx, snapshot, OnConflict::Overwrite).await?;

        let target = (snapshot.id.as_str(), Some(snapshot.title.as_str()));

        let local_by_key: HashMap<TrackKey, &Track> = local.iter().map(|track| (track.key(), track)).collect();
        for key in &changes.removed {
            playlist::delete_track(&mut tx, &snapshot.id, key).await?;
            if let Some(track) = local_by_key.get(key) {
                let entry = ActionLogEntry::for_song(
                    ActionKind::RemoveSong,
                    ActionOrigin::Remote,
                    true,
                    target,
                    &track.song,
                    Some(&key.instance_id),
                    now,
                );
                record_action(&mut tx, &self.guard, &entry).await?;
            }
        }

        let added: HashSet<&TrackKey> = changes.added.iter().collect();
        let reindexed: HashSet<&TrackKey> = changes.reindexed.iter().collect();
        for track in &snapshot.tracks {
            let key = track.key();
            if added.contains(&key) {
                song::save_song(&mut tx, &track.song, OnConflict::DoNothing).await?;
                playlist::insert_track(&mut tx, &snapshot.id, track, now).await?;
                let entry = ActionLogEntry::for_song(
                    ActionKind::AddSong,
                    ActionOrigin::Remote,
                    true,
                    target,
                    &track.song,
                    Some(&track.instance_id),
                    now,
                );
                record_action(&mut tx, &self.guard, &entry).await?;
            } else if reindexed.contains(&key) {
                playlist::update_position(&mut tx, &snapshot.id, &key, track.position).await?;
            }
        }

        tx.commit().await?;
        Ok(changes)
    }
}
