//! Album repository trait and implementation

use crate::db::with_transient_retry;
use crate::error::Result;
use crate::models::{Album, AlbumRef, ArtistRef};
use crate::repositories::song::{attach_artists, save_song, SongRow, SONG_COLUMNS};
use crate::repositories::{artist, thumbnail, OnConflict};
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

#[derive(Debug, FromRow)]
struct AlbumRow {
    id: String,
    name: String,
    description: Option<String>,
    thumbnail_id: Option<String>,
    audio_playlist_id: Option<String>,
    year: Option<i32>,
    track_count: Option<i64>,
    duration_secs: Option<i64>,
}

/// Insert a partially known album unless it already exists.
pub async fn ensure_album_ref(conn: &mut SqliteConnection, album: &AlbumRef) -> Result<()> {
    sqlx::query("INSERT INTO albums (id, name) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
        .bind(&album.id)
        .bind(&album.name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Persist an album with its artist credits and songs.
///
/// Songs listed on the album are inserted if absent.
pub async fn save_album(conn: &mut SqliteConnection, album: &Album, on_conflict: OnConflict) -> Result<()> {
    if let Some(thumbnail_id) = &album.thumbnail_id {
        thumbnail::ensure_thumbnail(conn, thumbnail_id).await?;
    }

    let sql = match on_conflict {
        OnConflict::DoNothing => {
            "INSERT INTO albums (id, name, description, thumbnail_id, audio_playlist_id, year, track_count, duration_secs)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING"
        }
        OnConflict::Overwrite => {
            "INSERT INTO albums (id, name, description, thumbnail_id, audio_playlist_id, year, track_count, duration_secs)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, description = excluded.description,
                 thumbnail_id = excluded.thumbnail_id, audio_playlist_id = excluded.audio_playlist_id,
                 year = excluded.year, track_count = excluded.track_count,
                 duration_secs = excluded.duration_secs"
        }
    };

    sqlx::query(sql)
        .bind(&album.id)
        .bind(&album.name)
        .bind(&album.description)
        .bind(&album.thumbnail_id)
        .bind(&album.audio_playlist_id)
        .bind(album.year)
        .bind(album.track_count)
        .bind(album.duration_secs)
        .execute(&mut *conn)
        .await?;

    if on_conflict == OnConflict::Overwrite {
        sqlx::query("DELETE FROM album_artists WHERE album_id = ?")
            .bind(&album.id)
            .execute(&mut *conn)
            .await?;
    }

    for (position, artist_ref) in album.artists.iter().enumerate() {
        artist::ensure_artist_ref(conn, artist_ref).await?;
        sqlx::query(
            "INSERT INTO album_artists (album_id, artist_id, position) VALUES (?, ?, ?)
             ON CONFLICT(album_id, artist_id) DO NOTHING",
        )
        .bind(&album.id)
        .bind(&artist_ref.id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    for song in &album.songs {
        save_song(conn, song, OnConflict::DoNothing).await?;
    }

    debug!(album_id = %album.id, songs = album.songs.len(), "Album persisted");
    Ok(())
}

pub async fn find_album(conn: &mut SqliteConnection, id: &str) -> Result<Option<Album>> {
    let row = sqlx::query_as::<_, AlbumRow>(
        "SELECT id, name, description, thumbnail_id, audio_playlist_id, year, track_count, duration_secs
         FROM albums WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let artists: Vec<(String, String)> = sqlx::query_as(
        "SELECT ar.id, ar.name FROM album_artists aa JOIN artists ar ON ar.id = aa.artist_id
         WHERE aa.album_id = ? ORDER BY aa.position",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let song_rows = sqlx::query_as::<_, SongRow>(&format!(
        "SELECT {SONG_COLUMNS} FROM songs s LEFT JOIN albums a ON a.id = s.album_id
         WHERE s.album_id = ? ORDER BY s.rowid"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut songs: Vec<_> = song_rows.into_iter().map(SongRow::into_song).collect();
    attach_artists(conn, &mut songs).await?;

    Ok(Some(Album {
        id: row.id,
        name: row.name,
        description: row.description,
        thumbnail_id: row.thumbnail_id,
        audio_playlist_id: row.audio_playlist_id,
        year: row.year,
        track_count: row.track_count,
        duration_secs: row.duration_secs,
        artists: artists
            .into_iter()
            .map(|(id, name)| ArtistRef { id, name })
            .collect(),
        songs,
    }))
}

/// Album repository interface
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>>;

    async fn save(&self, album: &Album, on_conflict: OnConflict) -> Result<()>;

    /// Ids of albums only known by reference (never hydrated).
    async fn find_unhydrated_ids(&self) -> Result<Vec<String>>;
}

/// SQLite implementation of AlbumRepository
pub struct SqliteAlbumRepository {
    pool: SqlitePool,
}

impl SqliteAlbumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>> {
        with_transient_retry("albums.find_by_id", || async move {
            let mut conn = self.pool.acquire().await?;
            find_album(&mut conn, id).await
        })
        .await
    }

    #[instrument(skip(self, album), fields(album_id = %album.id))]
    async fn save(&self, album: &Album, on_conflict: OnConflict) -> Result<()> {
        with_transient_retry("albums.save", || async move {
            let mut tx = self.pool.begin().await?;
            save_album(&mut tx, album, on_conflict).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn find_unhydrated_ids(&self) -> Result<Vec<String>> {
        with_transient_retry("albums.find_unhydrated_ids", || async move {
            let ids: Vec<(String,)> =
                sqlx::query_as("SELECT id FROM albums WHERE audio_playlist_id IS NULL ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(ids.into_iter().map(|(id,)| id).collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::repositories::song::tests::song;

    fn album(id: &str) -> Album {
        Album {
            id: id.to_string(),
            name: "Hydrated".to_string(),
            description: Some("Liner notes".to_string()),
            thumbnail_id: Some("https://img/album".to_string()),
            audio_playlist_id: Some(format!("OLAK-{}", id)),
            year: Some(2021),
            track_count: Some(2),
            duration_secs: Some(400),
            artists: vec![ArtistRef {
                id: "ar1".to_string(),
                name: "Band".to_string(),
            }],
            songs: vec![
                song("s1", Some((id, "Hydrated")), &[("ar1", "Band")]),
                song("s2", Some((id, "Hydrated")), &[("ar1", "Band")]),
            ],
        }
    }

    #[tokio::test]
    async fn test_hydration_overwrites_partial_album() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteAlbumRepository::new(pool.clone());

        let mut conn = pool.acquire().await.unwrap();
        ensure_album_ref(
            &mut conn,
            &AlbumRef {
                id: "al1".to_string(),
                name: "Partial".to_string(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        assert_eq!(repo.find_unhydrated_ids().await.unwrap(), vec!["al1".to_string()]);

        repo.save(&album("al1"), OnConflict::Overwrite).await.unwrap();

        let found = repo.find_by_id("al1").await.unwrap().unwrap();
        assert!(found.is_hydrated());
        assert_eq!(found.name, "Hydrated");
        assert_eq!(found.artists.len(), 1);
        assert_eq!(found.songs.len(), 2);
        assert_eq!(found.songs[0].artists[0].id, "ar1");
        assert!(repo.find_unhydrated_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_ref_keeps_hydrated_album() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteAlbumRepository::new(pool.clone());
        repo.save(&album("al1"), OnConflict::Overwrite).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        ensure_album_ref(
            &mut conn,
            &AlbumRef {
                id: "al1".to_string(),
                name: "Other".to_string(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        let found = repo.find_by_id("al1").await.unwrap().unwrap();
        assert_eq!(found.name, "Hydrated");
    }
}
