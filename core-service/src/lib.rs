//! # Core Service
//!
//! The façade host applications talk to. A [`CoreService`] owns a
//! [`CoreContext`] and one [`ResourceAccessor`] per resource kind; every read
//! goes through the freshness policy and every remote call through the
//! session guard.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .database_path("mirror.db")
//!     .remote_client(client)
//!     .build()?;
//! let service = CoreService::bootstrap(config).await?;
//! let playlists = service.get_library(false).await?;
//! ```

pub mod accessor;
pub mod context;
pub mod editing;
pub mod error;
pub mod refresh;
pub mod resources;

pub use accessor::{BatchResourceKind, ResourceAccessor, ResourceKind};
pub use context::CoreContext;
pub use editing::{AddSongsOutcome, FailedAdd};
pub use error::{CoreError, ErrorKind, Result};
pub use refresh::{RefreshFailure, RefreshReport};

use core_library::models::{
    ActionLogEntry, Album, Artist, Playlist, ResourceType, Song, Thumbnail, HISTORY_PLAYLIST_ID, LIBRARY_ID,
};
use core_runtime::config::CoreConfig;
use core_sync::ChangeSet;
use resources::{AlbumKind, ArtistKind, HistoryKind, LibraryKind, PlaylistKind, SongKind, ThumbnailKind};
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
pub struct CoreService {
    ctx: CoreContext,
    library: ResourceAccessor<LibraryKind>,
    playlists: ResourceAccessor<PlaylistKind>,
    history: ResourceAccessor<HistoryKind>,
    albums: ResourceAccessor<AlbumKind>,
    artists: ResourceAccessor<ArtistKind>,
    songs: ResourceAccessor<SongKind>,
    thumbnails: ResourceAccessor<ThumbnailKind>,
}

impl CoreService {
    /// Validate `config`, open the store and build the service.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let ctx = CoreContext::connect(&config).await?;
        info!("Core service ready");
        Ok(Self::from_context(ctx))
    }

    pub fn from_context(ctx: CoreContext) -> Self {
        Self {
            ctx,
            library: ResourceAccessor::new(LibraryKind),
            playlists: ResourceAccessor::new(PlaylistKind),
            history: ResourceAccessor::new(HistoryKind),
            albums: ResourceAccessor::new(AlbumKind),
            artists: ResourceAccessor::new(ArtistKind),
            songs: ResourceAccessor::new(SongKind),
            thumbnails: ResourceAccessor::new(ThumbnailKind),
        }
    }

    pub fn context(&self) -> &CoreContext {
        &self.ctx
    }

    /// Playlists of the library plus the `history` shell entry.
    pub async fn get_library(&self, force_remote: bool) -> Result<Vec<Playlist>> {
        self.library.get(&self.ctx, LIBRARY_ID, &(), force_remote).await
    }

    /// A playlist with its tracks, duplicates flagged.
    ///
    /// The `history` id is served by [`CoreService::get_history`].
    pub async fn get_playlist(&self, id: &str, force_remote: bool) -> Result<Playlist> {
        if id == HISTORY_PLAYLIST_ID {
            return self.get_history(force_remote).await;
        }
        require_id(id)?;
        self.playlists.get(&self.ctx, id, &(), force_remote).await
    }

    pub async fn get_history(&self, force_remote: bool) -> Result<Playlist> {
        self.history
            .get(&self.ctx, HISTORY_PLAYLIST_ID, &(), force_remote)
            .await
    }

    pub async fn get_album(&self, id: &str, force_remote: bool) -> Result<Album> {
        require_id(id)?;
        self.albums.get(&self.ctx, id, &(), force_remote).await
    }

    pub async fn get_artist(&self, id: &str, force_remote: bool) -> Result<Artist> {
        require_id(id)?;
        self.artists.get(&self.ctx, id, &(), force_remote).await
    }

    pub async fn get_song(&self, id: &str, force_remote: bool) -> Result<Song> {
        require_id(id)?;
        self.songs.get(&self.ctx, id, &(), force_remote).await
    }

    /// Stored thumbnails for `ids` (ids or URLs), placeholders for unknown ones.
    pub async fn get_thumbnails(&self, ids: &[String], size: Option<i64>) -> Result<Vec<Thumbnail>> {
        self.thumbnails.get_many(&self.ctx, ids, &size).await
    }

    pub async fn get_thumbnail(&self, id: &str, size: Option<i64>, force_remote: bool) -> Result<Thumbnail> {
        require_id(id)?;
        self.thumbnails.get(&self.ctx, id, &size, force_remote).await
    }

    /// Apply a snapshot obtained elsewhere to the stored copy of playlist `id`.
    #[instrument(skip(self, snapshot))]
    pub async fn reconcile_playlist(&self, id: &str, snapshot: &Playlist) -> Result<ChangeSet> {
        if snapshot.id != id {
            return Err(CoreError::InvalidInput(format!(
                "Snapshot of playlist {} cannot be applied to {}",
                snapshot.id, id
            )));
        }

        let changes = self
            .ctx
            .reconciler
            .reconcile(snapshot)
            .await
            .map_err(|err| CoreError::for_resource(ResourceType::Playlist, id, err))?;

        self.ctx
            .freshness
            .mark_refreshed(id, ResourceType::Playlist)
            .await
            .map_err(|err| CoreError::store(ResourceType::Playlist, id, err))?;

        Ok(changes)
    }

    /// Audit entries of one playlist, oldest first.
    pub async fn action_log(&self, playlist_id: &str) -> Result<Vec<ActionLogEntry>> {
        self.ctx
            .action_log
            .list_for_playlist(playlist_id)
            .await
            .map_err(|err| CoreError::store(ResourceType::Playlist, playlist_id, err))
    }

    /// Thumbnails known but not downloaded yet, for the host's downloader.
    pub async fn pending_thumbnail_downloads(&self, limit: i64) -> Result<Vec<Thumbnail>> {
        self.ctx
            .thumbnails
            .pending_downloads(limit)
            .await
            .map_err(|err| CoreError::store(ResourceType::Thumbnail, "*", err))
    }

    pub async fn mark_thumbnail_downloaded(&self, id: &str, file_path: &str, size: Option<i64>) -> Result<()> {
        self.ctx
            .thumbnails
            .mark_downloaded(id, file_path, size)
            .await
            .map_err(|err| CoreError::store(ResourceType::Thumbnail, id, err))
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(CoreError::InvalidInput("Resource id cannot be empty".to_string()));
    }
    Ok(())
}
