//! Thumbnail repository trait and implementation

use crate::db::with_transient_retry;
use crate::error::Result;
use crate::models::{normalize_thumbnail_id, Thumbnail};
use crate::repositories::OnConflict;
use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Debug, FromRow)]
struct ThumbnailRow {
    id: String,
    url: Option<String>,
    size: Option<i64>,
    downloaded: bool,
    file_path: Option<String>,
}

impl From<ThumbnailRow> for Thumbnail {
    fn from(row: ThumbnailRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            size: row.size,
            downloaded: row.downloaded,
            file_path: row.file_path,
        }
    }
}

/// Insert a not-yet-downloaded row for `id` unless one exists.
pub async fn ensure_thumbnail(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    sqlx::query("INSERT INTO thumbnails (id, url, downloaded) VALUES (?, ?, 0) ON CONFLICT(id) DO NOTHING")
        .bind(id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn save_thumbnail(
    conn: &mut SqliteConnection,
    thumbnail: &Thumbnail,
    on_conflict: OnConflict,
) -> Result<()> {
    let sql = match on_conflict {
        OnConflict::DoNothing => {
            "INSERT INTO thumbnails (id, url, size, downloaded, file_path) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING"
        }
        OnConflict::Overwrite => {
            "INSERT INTO thumbnails (id, url, size, downloaded, file_path) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET url = excluded.url, size = excluded.size,
                 downloaded = excluded.downloaded, file_path = excluded.file_path"
        }
    };

    sqlx::query(sql)
        .bind(&thumbnail.id)
        .bind(&thumbnail.url)
        .bind(thumbnail.size)
        .bind(thumbnail.downloaded)
        .bind(&thumbnail.file_path)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn find_thumbnails(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<HashMap<String, Thumbnail>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, url, size, downloaded, file_path FROM thumbnails WHERE id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows = builder
        .build_query_as::<ThumbnailRow>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.id.clone(), Thumbnail::from(row)))
        .collect())
}

/// Thumbnail repository interface
#[async_trait]
pub trait ThumbnailRepository: Send + Sync {
    /// Find thumbnails by id or URL, keyed by normalized id.
    async fn find_many(&self, ids: &[String]) -> Result<HashMap<String, Thumbnail>>;

    async fn save(&self, thumbnail: &Thumbnail, on_conflict: OnConflict) -> Result<()>;

    /// Record a finished download.
    async fn mark_downloaded(&self, id: &str, file_path: &str, size: Option<i64>) -> Result<()>;

    /// Rows still waiting for the downloader.
    async fn pending_downloads(&self, limit: i64) -> Result<Vec<Thumbnail>>;
}

/// SQLite implementation of ThumbnailRepository
pub struct SqliteThumbnailRepository {
    pool: SqlitePool,
}

impl SqliteThumbnailRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThumbnailRepository for SqliteThumbnailRepository {
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_many(&self, ids: &[String]) -> Result<HashMap<String, Thumbnail>> {
        let normalized: Vec<String> = ids.iter().map(|id| normalize_thumbnail_id(id)).collect();
        let normalized = &normalized;

        with_transient_retry("thumbnails.find_many", || async move {
            let mut conn = self.pool.acquire().await?;
            find_thumbnails(&mut conn, normalized).await
        })
        .await
    }

    async fn save(&self, thumbnail: &Thumbnail, on_conflict: OnConflict) -> Result<()> {
        with_transient_retry("thumbnails.save", || async move {
            let mut conn = self.pool.acquire().await?;
            save_thumbnail(&mut conn, thumbnail, on_conflict).await
        })
        .await
    }

    #[instrument(skip(self, file_path))]
    async fn mark_downloaded(&self, id: &str, file_path: &str, size: Option<i64>) -> Result<()> {
        let thumbnail = Thumbnail {
            id: normalize_thumbnail_id(id),
            url: Some(id.to_string()),
            size,
            downloaded: true,
            file_path: Some(file_path.to_string()),
        };
        debug!(thumbnail_id = %thumbnail.id, "Recording downloaded thumbnail");
        self.save(&thumbnail, OnConflict::Overwrite).await
    }

    async fn pending_downloads(&self, limit: i64) -> Result<Vec<Thumbnail>> {
        with_transient_retry("thumbnails.pending_downloads", || async move {
            let rows = sqlx::query_as::<_, ThumbnailRow>(
                "SELECT id, url, size, downloaded, file_path FROM thumbnails
                 WHERE downloaded = 0 ORDER BY id LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(Thumbnail::from).collect())
        })
        .await
    }
}
