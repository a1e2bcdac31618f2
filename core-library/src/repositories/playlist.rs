//! Playlist repository trait and implementation
//!
//! Playlist membership rows are keyed by (playlist id, instance id) and carry
//! the song id and the position of the occurrence.

use crate::db::with_transient_retry;
use crate::error::Result;
use crate::models::{Playlist, Track, TrackKey};
use crate::repositories::song::{attach_artists, SongRow, SONG_COLUMNS};
use crate::repositories::{thumbnail, OnConflict};
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, instrument};

#[derive(Debug, FromRow)]
struct PlaylistRow {
    id: String,
    title: String,
    description: Option<String>,
    thumbnail_id: Option<String>,
    track_count: i64,
}

impl From<PlaylistRow> for Playlist {
    fn from(row: PlaylistRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            thumbnail_id: row.thumbnail_id,
            track_count: row.track_count,
            tracks: Vec::new(),
        }
    }
}

#[derive(Debug, FromRow)]
struct TrackRow {
    instance_id: String,
    position: i64,
    #[sqlx(flatten)]
    song: SongRow,
}

const PLAYLIST_SUMMARY_SQL: &str = "SELECT p.id, p.title, p.description, p.thumbnail_id,
        (SELECT COUNT(*) FROM playlist_tracks pt WHERE pt.playlist_id = p.id) AS track_count
     FROM playlists p";

/// Write playlist metadata (not its tracks).
pub async fn save_playlist_metadata(
    conn: &mut SqliteConnection,
    playlist: &Playlist,
    on_conflict: OnConflict,
) -> Result<()> {
    if let Some(thumbnail_id) = &playlist.thumbnail_id {
        thumbnail::ensure_thumbnail(conn, thumbnail_id).await?;
    }

    let sql = match on_conflict {
        OnConflict::DoNothing => {
            "INSERT INTO playlists (id, title, description, thumbnail_id) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING"
        }
        OnConflict::Overwrite => {
            "INSERT INTO playlists (id, title, description, thumbnail_id) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title,
                 description = excluded.description, thumbnail_id = excluded.thumbnail_id"
        }
    };

    sqlx::query(sql)
        .bind(&playlist.id)
        .bind(&playlist.title)
        .bind(&playlist.description)
        .bind(&playlist.thumbnail_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Tracks of a playlist in position order, with artists attached.
pub async fn load_tracks(conn: &mut SqliteConnection, playlist_id: &str) -> Result<Vec<Track>> {
    let rows = sqlx::query_as::<_, TrackRow>(&format!(
        "SELECT pt.instance_id, pt.position, {SONG_COLUMNS}
         FROM playlist_tracks pt
         JOIN songs s ON s.id = pt.song_id
         LEFT JOIN albums a ON a.id = s.album_id
         WHERE pt.playlist_id = ?
         ORDER BY pt.position, pt.instance_id"
    ))
    .bind(playlist_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut positions = Vec::with_capacity(rows.len());
    let mut songs = Vec::with_capacity(rows.len());
    for row in rows {
        positions.push((row.instance_id, row.position));
        songs.push(row.song.into_song());
    }
    attach_artists(conn, &mut songs).await?;

    Ok(songs
        .into_iter()
        .zip(positions)
        .map(|(song, (instance_id, position))| Track::new(song, instance_id, position))
        .collect())
}

pub async fn find_playlist(conn: &mut SqliteConnection, id: &str) -> Result<Option<Playlist>> {
    let row = sqlx::query_as::<_, PlaylistRow>(&format!("{PLAYLIST_SUMMARY_SQL} WHERE p.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut playlist = Playlist::from(row);
    playlist.tracks = load_tracks(conn, id).await?;
    Ok(Some(playlist))
}

pub async fn insert_track(
    conn: &mut SqliteConnection,
    playlist_id: &str,
    track: &Track,
    added_at: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO playlist_tracks (playlist_id, instance_id, song_id, position, added_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(playlist_id)
    .bind(&track.instance_id)
    .bind(&track.song.id)
    .bind(track.position)
    .bind(added_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Delete the membership row matching both halves of `key`.
pub async fn delete_track(conn: &mut SqliteConnection, playlist_id: &str, key: &TrackKey) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM playlist_tracks WHERE playlist_id = ? AND instance_id = ? AND song_id = ?",
    )
    .bind(playlist_id)
    .bind(&key.instance_id)
    .bind(&key.stable_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_position(
    conn: &mut SqliteConnection,
    playlist_id: &str,
    key: &TrackKey,
    position: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE playlist_tracks SET position = ?
         WHERE playlist_id = ? AND instance_id = ? AND song_id = ?",
    )
    .bind(position)
    .bind(playlist_id)
    .bind(&key.instance_id)
    .bind(&key.stable_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a playlist and its membership rows.
pub async fn delete_playlist(conn: &mut SqliteConnection, playlist_id: &str) -> Result<bool> {
    sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = ?")
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query("DELETE FROM playlists WHERE id = ?")
        .bind(playlist_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Find a playlist with its tracks
    ///
    /// # Returns
    /// - `Ok(Some(playlist))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>>;

    /// All playlists without tracks; `track_count` is counted locally.
    async fn list_summaries(&self) -> Result<Vec<Playlist>>;

    async fn save_metadata(&self, playlist: &Playlist, on_conflict: OnConflict) -> Result<()>;

    /// Delete a playlist with its membership rows
    ///
    /// # Returns
    /// - `Ok(true)` if the playlist was deleted
    /// - `Ok(false)` if it was not found
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Distinct song ids currently in the playlist.
    async fn song_ids(&self, playlist_id: &str) -> Result<HashSet<String>>;

    /// Delete membership rows; returns how many existed.
    async fn remove_tracks(&self, playlist_id: &str, keys: &[TrackKey]) -> Result<u64>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>> {
        with_transient_retry("playlists.find_by_id", || async move {
            let mut conn = self.pool.acquire().await?;
            find_playlist(&mut conn, id).await
        })
        .await
    }

    async fn list_summaries(&self) -> Result<Vec<Playlist>> {
        with_transient_retry("playlists.list_summaries", || async move {
            let rows = sqlx::query_as::<_, PlaylistRow>(&format!("{PLAYLIST_SUMMARY_SQL} ORDER BY p.rowid"))
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(Playlist::from).collect())
        })
        .await
    }

    async fn save_metadata(&self, playlist: &Playlist, on_conflict: OnConflict) -> Result<()> {
        with_transient_retry("playlists.save_metadata", || async move {
            let mut tx = self.pool.begin().await?;
            save_playlist_metadata(&mut tx, playlist, on_conflict).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool> {
        let deleted = with_transient_retry("playlists.delete", || async move {
            let mut tx = self.pool.begin().await?;
            let deleted = delete_playlist(&mut tx, id).await?;
            tx.commit().await?;
            Ok(deleted)
        })
        .await?;

        debug!(deleted, "Playlist delete finished");
        Ok(deleted)
    }

    async fn song_ids(&self, playlist_id: &str) -> Result<HashSet<String>> {
        with_transient_retry("playlists.song_ids", || async move {
            let rows: Vec<(String,)> =
                sqlx::query_as("SELECT DISTINCT song_id FROM playlist_tracks WHERE playlist_id = ?")
                    .bind(playlist_id)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        })
        .await
    }

    #[instrument(skip(self, keys), fields(count = keys.len()))]
    async fn remove_tracks(&self, playlist_id: &str, keys: &[TrackKey]) -> Result<u64> {
        with_transient_retry("playlists.remove_tracks", || async move {
            let mut tx = self.pool.begin().await?;
            let mut removed = 0;
            for key in keys {
                if delete_track(&mut tx, playlist_id, key).await? {
                    removed += 1;
                }
            }
            tx.commit().await?;
            Ok(removed)
        })
        .await
    }
}
