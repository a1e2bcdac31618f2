//! Audit and history writes with dangling-reference repair
//!
//! Action log and listening history rows reference songs. When the song is
//! not stored yet the insert fails with a foreign key violation; the song is
//! then fetched from remote, inserted if absent, and the write retried once.

use crate::error::{Result, SyncError};
use core_auth::SessionGuard;
use core_library::models::{ActionLogEntry, Song};
use core_library::repositories::{action_log, history, song, OnConflict};
use sqlx::SqliteConnection;
use tracing::{debug, instrument, warn};

/// Fetch a song from remote and insert it (and its references) if absent.
#[instrument(skip(conn, guard))]
pub async fn persist_missing_song(
    conn: &mut SqliteConnection,
    guard: &SessionGuard,
    song_id: &str,
) -> Result<Song> {
    let remote = guard
        .call("get_song", |client| async move { client.get_song(song_id).await })
        .await
        .map_err(|source| {
            warn!(error = %source, "Could not fetch referenced song");
            SyncError::DanglingReference {
                song_id: song_id.to_string(),
                source,
            }
        })?;

    let song = Song::from(&remote);
    song::save_song(conn, &song, OnConflict::DoNothing).await?;
    debug!("Persisted missing song");
    Ok(song)
}

/// Append an action log entry, repairing a missing song reference once.
pub async fn record_action(
    conn: &mut SqliteConnection,
    guard: &SessionGuard,
    entry: &ActionLogEntry,
) -> Result<i64> {
    match action_log::append_entry(conn, entry).await {
        Err(err) if err.is_foreign_key_violation() => {
            let Some(song_id) = entry.song_id.as_deref() else {
                return Err(err.into());
            };
            debug!(song_id, kind = entry.kind.as_str(), "Action references unknown song");
            persist_missing_song(conn, guard, song_id).await?;
            Ok(action_log::append_entry(conn, entry).await?)
        }
        other => Ok(other?),
    }
}

/// Append a play to the listening history, repairing a missing song once.
pub async fn record_play(
    conn: &mut SqliteConnection,
    guard: &SessionGuard,
    song_id: &str,
    listened_at: i64,
) -> Result<i64> {
    match history::append_play(conn, song_id, listened_at).await {
        Err(err) if err.is_foreign_key_violation() => {
            debug!(song_id, "Play references unknown song");
            persist_missing_song(conn, guard, song_id).await?;
            Ok(history::append_play(conn, song_id, listened_at).await?)
        }
        other => Ok(other?),
    }
}
