//! Song repository trait and implementation
//!
//! Saving a song also makes sure the rows it references exist: its thumbnail,
//! its album and its artists are inserted if absent, never overwritten.

use crate::db::with_transient_retry;
use crate::error::Result;
use crate::models::{AlbumRef, ArtistRef, Song};
use crate::repositories::{album, artist, thumbnail, OnConflict};
use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::instrument;

/// Column list matching [`SongRow`]; expects `songs s LEFT JOIN albums a`.
pub(crate) const SONG_COLUMNS: &str =
    "s.id, s.title, s.album_id, a.name AS album_name, s.duration_secs, s.explicit, s.is_local, s.thumbnail_id";

#[derive(Debug, FromRow)]
pub(crate) struct SongRow {
    pub id: String,
    pub title: String,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub duration_secs: Option<i64>,
    pub explicit: bool,
    pub is_local: bool,
    pub thumbnail_id: Option<String>,
}

impl SongRow {
    pub(crate) fn into_song(self) -> Song {
        let album = match (self.album_id, self.album_name) {
            (Some(id), Some(name)) => Some(AlbumRef { id, name }),
            _ => None,
        };

        Song {
            id: self.id,
            title: self.title,
            album,
            artists: Vec::new(),
            duration_secs: self.duration_secs,
            explicit: self.explicit,
            is_local: self.is_local,
            thumbnail_id: self.thumbnail_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct SongArtistRow {
    song_id: String,
    artist_id: String,
    artist_name: String,
}

/// Fill in `artists` for every song, in credited order.
pub(crate) async fn attach_artists(conn: &mut SqliteConnection, songs: &mut [Song]) -> Result<()> {
    if songs.is_empty() {
        return Ok(());
    }

    let mut by_song: HashMap<String, Vec<ArtistRef>> = HashMap::new();

    // Stay well under SQLite's bound-parameter limit
    for chunk in songs.chunks(500) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT sa.song_id, ar.id AS artist_id, ar.name AS artist_name
             FROM song_artists sa JOIN artists ar ON ar.id = sa.artist_id
             WHERE sa.song_id IN (",
        );
        let mut separated = builder.separated(", ");
        for song in chunk {
            separated.push_bind(song.id.clone());
        }
        separated.push_unseparated(") ORDER BY sa.song_id, sa.position");

        let rows = builder
            .build_query_as::<SongArtistRow>()
            .fetch_all(&mut *conn)
            .await?;

        for row in rows {
            by_song.entry(row.song_id).or_default().push(ArtistRef {
                id: row.artist_id,
                name: row.artist_name,
            });
        }
    }

    for song in songs.iter_mut() {
        if let Some(artists) = by_song.get(&song.id) {
            song.artists = artists.clone();
        }
    }

    Ok(())
}

pub async fn find_song(conn: &mut SqliteConnection, id: &str) -> Result<Option<Song>> {
    let row = sqlx::query_as::<_, SongRow>(&format!(
        "SELECT {SONG_COLUMNS} FROM songs s LEFT JOIN albums a ON a.id = s.album_id WHERE s.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut songs = [row.into_song()];
    attach_artists(conn, &mut songs).await?;
    let [song] = songs;
    Ok(Some(song))
}

/// Persist a song and the reference rows it points at.
///
/// Album, artist and thumbnail rows are only inserted when missing. The song
/// row itself follows `on_conflict`; with [`OnConflict::Overwrite`] its artist
/// credits are replaced as well.
pub async fn save_song(conn: &mut SqliteConnection, song: &Song, on_conflict: OnConflict) -> Result<()> {
    if let Some(thumbnail_id) = &song.thumbnail_id {
        thumbnail::ensure_thumbnail(conn, thumbnail_id).await?;
    }
    if let Some(album_ref) = &song.album {
        album::ensure_album_ref(conn, album_ref).await?;
    }
    for artist_ref in &song.artists {
        artist::ensure_artist_ref(conn, artist_ref).await?;
    }

    let sql = match on_conflict {
        OnConflict::DoNothing => {
            "INSERT INTO songs (id, title, album_id, duration_secs, explicit, is_local, thumbnail_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING"
        }
        OnConflict::Overwrite => {
            "INSERT INTO songs (id, title, album_id, duration_secs, explicit, is_local, thumbnail_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title, album_id = excluded.album_id,
                 duration_secs = excluded.duration_secs, explicit = excluded.explicit,
                 is_local = excluded.is_local, thumbnail_id = excluded.thumbnail_id"
        }
    };

    let inserted = sqlx::query(sql)
        .bind(&song.id)
        .bind(&song.title)
        .bind(song.album.as_ref().map(|a| a.id.as_str()))
        .bind(song.duration_secs)
        .bind(song.explicit)
        .bind(song.is_local)
        .bind(&song.thumbnail_id)
        .execute(&mut *conn)
        .await?
        .rows_affected()
        > 0;

    if on_conflict == OnConflict::Overwrite {
        sqlx::query("DELETE FROM song_artists WHERE song_id = ?")
            .bind(&song.id)
            .execute(&mut *conn)
            .await?;
    } else if !inserted {
        return Ok(());
    }

    for (position, artist_ref) in song.artists.iter().enumerate() {
        sqlx::query(
            "INSERT INTO song_artists (song_id, artist_id, position) VALUES (?, ?, ?)
             ON CONFLICT(song_id, artist_id) DO NOTHING",
        )
        .bind(&song.id)
        .bind(&artist_ref.id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Song repository interface
#[async_trait]
pub trait SongRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Song>>;

    async fn save(&self, song: &Song, on_conflict: OnConflict) -> Result<()>;
}

/// SQLite implementation of SongRepository
pub struct SqliteSongRepository {
    pool: SqlitePool,
}

impl SqliteSongRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SongRepository for SqliteSongRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Song>> {
        with_transient_retry("songs.find_by_id", || async move {
            let mut conn = self.pool.acquire().await?;
            find_song(&mut conn, id).await
        })
        .await
    }

    #[instrument(skip(self, song), fields(song_id = %song.id))]
    async fn save(&self, song: &Song, on_conflict: OnConflict) -> Result<()> {
        with_transient_retry("songs.save", || async move {
            let mut tx = self.pool.begin().await?;
            save_song(&mut tx, song, on_conflict).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }
}
