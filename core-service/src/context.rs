//! Explicitly constructed service context
//!
//! Holds the store handle, the guarded remote client, the freshness policy
//! and the settings every operation needs. Built once by the host from a
//! [`CoreConfig`] and shared by reference; there is no global state.

use crate::error::Result;
use bridge_traits::time::Clock;
use core_auth::SessionGuard;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::repositories::{
    ActionLogRepository, AlbumRepository, ArtistRepository, HistoryRepository, PlaylistRepository,
    SongRepository, SqliteActionLogRepository, SqliteAlbumRepository, SqliteArtistRepository,
    SqliteCacheRecordRepository, SqliteHistoryRepository, SqlitePlaylistRepository,
    SqliteSongRepository, SqliteThumbnailRepository, ThumbnailRepository,
};
use core_library::FreshnessPolicy;
use core_runtime::config::{CoreConfig, HistorySettings, RefreshSettings};
use core_sync::{HistoryImporter, PlaylistReconciler};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

pub struct CoreContext {
    pub pool: SqlitePool,
    pub session: Arc<SessionGuard>,
    pub freshness: FreshnessPolicy,
    pub clock: Arc<dyn Clock>,
    pub history: HistorySettings,
    pub refresh: RefreshSettings,
    pub reconciler: PlaylistReconciler,
    pub importer: HistoryImporter,
    pub playlists: Arc<dyn PlaylistRepository>,
    pub songs: Arc<dyn SongRepository>,
    pub albums: Arc<dyn AlbumRepository>,
    pub artists: Arc<dyn ArtistRepository>,
    pub thumbnails: Arc<dyn ThumbnailRepository>,
    pub action_log: Arc<dyn ActionLogRepository>,
    pub listening_history: Arc<dyn HistoryRepository>,
}

impl CoreContext {
    /// Open the store described by `config` and build the context.
    pub async fn connect(config: &CoreConfig) -> Result<Self> {
        config.validate()?;

        let pool = create_pool(database_config(config))
            .await
            .map_err(|err| core_runtime::Error::Config(format!("Cannot open mirror store: {}", err)))?;

        info!(in_memory = config.is_in_memory(), "Mirror store ready");
        Ok(Self::with_pool(config, pool))
    }

    /// Build the context around an already opened pool.
    pub fn with_pool(config: &CoreConfig, pool: SqlitePool) -> Self {
        let session = Arc::new(SessionGuard::new(Arc::clone(&config.remote_client)));
        let clock = Arc::clone(&config.clock);

        let freshness = FreshnessPolicy::new(
            Arc::new(SqliteCacheRecordRepository::new(pool.clone())),
            config.cache_lifetimes,
            Arc::clone(&clock),
        );
        let reconciler = PlaylistReconciler::new(pool.clone(), Arc::clone(&session), Arc::clone(&clock));
        let importer = HistoryImporter::new(
            pool.clone(),
            Arc::clone(&session),
            Arc::clone(&clock),
            config.history,
        );

        Self {
            playlists: Arc::new(SqlitePlaylistRepository::new(pool.clone())),
            songs: Arc::new(SqliteSongRepository::new(pool.clone())),
            albums: Arc::new(SqliteAlbumRepository::new(pool.clone())),
            artists: Arc::new(SqliteArtistRepository::new(pool.clone())),
            thumbnails: Arc::new(SqliteThumbnailRepository::new(pool.clone())),
            action_log: Arc::new(SqliteActionLogRepository::new(pool.clone())),
            listening_history: Arc::new(SqliteHistoryRepository::new(pool.clone())),
            pool,
            session,
            freshness,
            clock,
            history: config.history,
            refresh: config.refresh.clone(),
            reconciler,
            importer,
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }
}

/// Pool configuration for the store named by `config`.
fn database_config(config: &CoreConfig) -> DatabaseConfig {
    let store = &config.store;
    let database = if config.is_in_memory() {
        DatabaseConfig::in_memory()
    } else {
        DatabaseConfig::new(&config.database_path)
            .max_lifetime(store.max_lifetime)
            .idle_timeout(store.idle_timeout)
    };

    database
        .min_connections(store.min_connections)
        .max_connections(store.max_connections)
        .acquire_timeout(store.acquire_timeout)
        .statement_cache_capacity(store.statement_cache_capacity)
}
