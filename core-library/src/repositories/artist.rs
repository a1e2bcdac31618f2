//! Artist repository trait and implementation

use crate::db::with_transient_retry;
use crate::error::Result;
use crate::models::{Artist, ArtistRef};
use crate::repositories::song::{attach_artists, save_song, SongRow, SONG_COLUMNS};
use crate::repositories::{thumbnail, OnConflict};
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::instrument;

#[derive(Debug, FromRow)]
struct ArtistRow {
    id: String,
    name: String,
    description: Option<String>,
    thumbnail_id: Option<String>,
}

/// Insert a partially known artist unless it already exists.
pub async fn ensure_artist_ref(conn: &mut SqliteConnection, artist: &ArtistRef) -> Result<()> {
    sqlx::query("INSERT INTO artists (id, name) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
        .bind(&artist.id)
        .bind(&artist.name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Persist an artist; its listed songs are inserted if absent.
pub async fn save_artist(conn: &mut SqliteConnection, artist: &Artist, on_conflict: OnConflict) -> Result<()> {
    if let Some(thumbnail_id) = &artist.thumbnail_id {
        thumbnail::ensure_thumbnail(conn, thumbnail_id).await?;
    }

    let sql = match on_conflict {
        OnConflict::DoNothing => {
            "INSERT INTO artists (id, name, description, thumbnail_id) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING"
        }
        OnConflict::Overwrite => {
            "INSERT INTO artists (id, name, description, thumbnail_id) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, description = excluded.description,
                 thumbnail_id = excluded.thumbnail_id"
        }
    };

    sqlx::query(sql)
        .bind(&artist.id)
        .bind(&artist.name)
        .bind(&artist.description)
        .bind(&artist.thumbnail_id)
        .execute(&mut *conn)
        .await?;

    for song in &artist.songs {
        save_song(conn, song, OnConflict::DoNothing).await?;
    }

    Ok(())
}

pub async fn find_artist(conn: &mut SqliteConnection, id: &str) -> Result<Option<Artist>> {
    let row = sqlx::query_as::<_, ArtistRow>(
        "SELECT id, name, description, thumbnail_id FROM artists WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let song_rows = sqlx::query_as::<_, SongRow>(&format!(
        "SELECT {SONG_COLUMNS} FROM song_artists sa
         JOIN songs s ON s.id = sa.song_id
         LEFT JOIN albums a ON a.id = s.album_id
         WHERE sa.artist_id = ? ORDER BY s.rowid"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut songs: Vec<_> = song_rows.into_iter().map(SongRow::into_song).collect();
    attach_artists(conn, &mut songs).await?;

    Ok(Some(Artist {
        id: row.id,
        name: row.name,
        description: row.description,
        thumbnail_id: row.thumbnail_id,
        songs,
    }))
}

/// Artist repository interface
#[async_trait]
pub trait ArtistRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Artist>>;

    async fn save(&self, artist: &Artist, on_conflict: OnConflict) -> Result<()>;
}

/// SQLite implementation of ArtistRepository
pub struct SqliteArtistRepository {
    pool: SqlitePool,
}

impl SqliteArtistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtistRepository for SqliteArtistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Artist>> {
        with_transient_retry("artists.find_by_id", || async move {
            let mut conn = self.pool.acquire().await?;
            find_artist(&mut conn, id).await
        })
        .await
    }

    #[instrument(skip(self, artist), fields(artist_id = %artist.id))]
    async fn save(&self, artist: &Artist, on_conflict: OnConflict) -> Result<()> {
        with_transient_retry("artists.save", || async move {
            let mut tx = self.pool.begin().await?;
            save_artist(&mut tx, artist, on_conflict).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }
}
