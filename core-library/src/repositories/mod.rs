//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for the mirror store.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - SQLite implementations use sqlx for async database access and retry
//!   transient failures once via [`with_transient_retry`](crate::db::with_transient_retry)
//! - Every module also exposes connection-level functions taking
//!   `&mut SqliteConnection`, so multi-entity writes can share one transaction
//!
//! ## Available Repositories
//!
//! - `CacheRecordRepository` - freshness certificates per (resource id, type)
//! - `PlaylistRepository` - playlist metadata and track membership
//! - `SongRepository` - songs with their album and artist references
//! - `AlbumRepository` / `ArtistRepository` - hydrated catalog entities
//! - `ThumbnailRepository` - image rows shared between entities
//! - `ActionLogRepository` - append-only audit trail
//! - `HistoryRepository` - ordered listening log

pub mod action_log;
pub mod album;
pub mod artist;
pub mod cache;
pub mod history;
pub mod playlist;
pub mod song;
pub mod thumbnail;

pub use action_log::{ActionLogRepository, SqliteActionLogRepository};
pub use album::{AlbumRepository, SqliteAlbumRepository};
pub use artist::{ArtistRepository, SqliteArtistRepository};
pub use cache::{CacheRecordRepository, SqliteCacheRecordRepository};
pub use history::{HistoryRepository, SqliteHistoryRepository};
pub use playlist::{PlaylistRepository, SqlitePlaylistRepository};
pub use song::{SongRepository, SqliteSongRepository};
pub use thumbnail::{SqliteThumbnailRepository, ThumbnailRepository};

/// What a write does when the row already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Keep the existing row (first writer wins)
    DoNothing,
    /// Replace the existing row (last writer wins)
    Overwrite,
}
