//! # Core Configuration Module
//!
//! Provides configuration management for the mirror core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding the injected collaborators and all tunables. It enforces fail-fast
//! validation so a misconfigured core never starts.
//!
//! ## Required Dependencies
//!
//! - `RemoteMusicClient` - the remote music service
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - time source (default: `SystemClock`)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/mirror.db")
//!     .remote_client(Arc::new(MyRemoteClient::new()))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Missing collaborators surface as [`Error::CapabilityMissing`], invalid
//! tunables as [`Error::Config`].

use crate::error::{Error, Result};
use bridge_traits::{Clock, RemoteMusicClient, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DAY: u64 = 24 * 60 * 60;

/// Database path that selects an in-memory store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// How long a cached copy of each resource type stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLifetimes {
    pub library: Duration,
    pub playlist: Duration,
    pub song: Duration,
    pub artist: Duration,
    pub album: Duration,
    pub thumbnail: Duration,
    pub history: Duration,
}

impl Default for CacheLifetimes {
    fn default() -> Self {
        Self {
            library: Duration::from_secs(DAY),
            playlist: Duration::from_secs(DAY),
            song: Duration::from_secs(30 * DAY),
            artist: Duration::from_secs(7 * DAY),
            album: Duration::from_secs(1000 * DAY),
            thumbnail: Duration::from_secs(1000 * DAY),
            history: Duration::from_secs(DAY / 2),
        }
    }
}

impl CacheLifetimes {
    /// Same lifetime for every resource type.
    pub fn uniform(lifetime: Duration) -> Self {
        Self {
            library: lifetime,
            playlist: lifetime,
            song: lifetime,
            artist: lifetime,
            album: lifetime,
            thumbnail: lifetime,
            history: lifetime,
        }
    }

    fn named(&self) -> [(&'static str, Duration); 7] {
        [
            ("library", self.library),
            ("playlist", self.playlist),
            ("song", self.song),
            ("artist", self.artist),
            ("album", self.album),
            ("thumbnail", self.thumbnail),
            ("history", self.history),
        ]
    }
}

/// Tunables for the incremental history import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySettings {
    /// Number of most recent local entries compared against the remote feed.
    pub local_prefix_len: usize,
    /// Consecutive matches required to locate the already-imported region.
    pub match_threshold: usize,
    /// Number of local entries served by the history resource.
    pub read_limit: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            local_prefix_len: 5,
            match_threshold: 5,
            read_limit: 200,
        }
    }
}

/// Tunables for a bulk refresh run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Playlists never refreshed in bulk (e.g. the auto-generated liked list).
    pub skip_playlist_ids: Vec<String>,
    /// Albums whose id contains one of these markers are never hydrated.
    pub skip_album_markers: Vec<String>,
    /// Pause between consecutive remote calls.
    pub pause_between_calls: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            skip_playlist_ids: vec!["LM".to_string()],
            skip_album_markers: vec!["privately_owned".to_string()],
            pause_between_calls: Duration::ZERO,
        }
    }
}

impl RefreshSettings {
    pub fn skips_playlist(&self, playlist_id: &str) -> bool {
        self.skip_playlist_ids.iter().any(|id| id == playlist_id)
    }

    pub fn skips_album(&self, album_id: &str) -> bool {
        self.skip_album_markers
            .iter()
            .any(|marker| album_id.contains(marker.as_str()))
    }
}

/// Connection pool tuning for the mirror store.
///
/// `max_lifetime` and `idle_timeout` only apply to file-backed stores; an
/// in-memory store lives as long as its connections do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub max_lifetime: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    /// Prepared statements cached per connection
    pub statement_cache_capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            statement_cache_capacity: 100,
        }
    }
}

/// Core configuration for the mirror.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file, or [`IN_MEMORY_DATABASE`]
    pub database_path: PathBuf,

    /// Remote music service client (required)
    pub remote_client: Arc<dyn RemoteMusicClient>,

    /// Time source used for freshness decisions
    pub clock: Arc<dyn Clock>,

    pub cache_lifetimes: CacheLifetimes,

    pub history: HistorySettings,

    pub refresh: RefreshSettings,

    pub store: StoreSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("remote_client", &"RemoteMusicClient { ... }")
            .field("clock", &"Clock { ... }")
            .field("cache_lifetimes", &self.cache_lifetimes)
            .field("history", &self.history)
            .field("refresh", &self.refresh)
            .field("store", &self.store)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(IN_MEMORY_DATABASE)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Every cache lifetime is positive
    /// - History prefix, threshold and read limit are consistent
    /// - The pool allows at least one connection and `min <= max`
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        for (name, lifetime) in self.cache_lifetimes.named() {
            if lifetime.is_zero() {
                return Err(Error::Config(format!(
                    "Cache lifetime for {} must be greater than zero",
                    name
                )));
            }
        }

        let history = &self.history;
        if history.match_threshold == 0 {
            return Err(Error::Config(
                "History match threshold must be at least 1".to_string(),
            ));
        }

        if history.match_threshold > history.local_prefix_len {
            return Err(Error::Config(format!(
                "History match threshold ({}) cannot exceed the local prefix length ({})",
                history.match_threshold, history.local_prefix_len
            )));
        }

        if history.read_limit == 0 {
            return Err(Error::Config(
                "History read limit must be at least 1".to_string(),
            ));
        }

        let store = &self.store;
        if store.max_connections == 0 {
            return Err(Error::Config(
                "Store must allow at least one connection".to_string(),
            ));
        }

        if store.min_connections > store.max_connections {
            return Err(Error::Config(format!(
                "Store min connections ({}) cannot exceed max connections ({})",
                store.min_connections, store.max_connections
            )));
        }

        if store.acquire_timeout.is_zero() {
            return Err(Error::Config(
                "Store acquire timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn remote_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "RemoteMusicClient".to_string(),
        message: "A RemoteMusicClient implementation is required to refresh cached resources. \
                 Inject one with CoreConfigBuilder::remote_client()."
            .to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    remote_client: Option<Arc<dyn RemoteMusicClient>>,
    clock: Option<Arc<dyn Clock>>,
    cache_lifetimes: Option<CacheLifetimes>,
    history: Option<HistorySettings>,
    refresh: Option<RefreshSettings>,
    store: Option<StoreSettings>,
}

impl CoreConfigBuilder {
    /// Sets the database file path.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Uses an in-memory database.
    pub fn in_memory_database(self) -> Self {
        self.database_path(IN_MEMORY_DATABASE)
    }

    pub fn remote_client(mut self, client: Arc<dyn RemoteMusicClient>) -> Self {
        self.remote_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache_lifetimes(mut self, lifetimes: CacheLifetimes) -> Self {
        self.cache_lifetimes = Some(lifetimes);
        self
    }

    pub fn history(mut self, settings: HistorySettings) -> Self {
        self.history = Some(settings);
        self
    }

    pub fn refresh(mut self, settings: RefreshSettings) -> Self {
        self.refresh = Some(settings);
        self
    }

    pub fn store(mut self, settings: StoreSettings) -> Self {
        self.store = Some(settings);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the database path is missing or a tunable is invalid
    /// - [`Error::CapabilityMissing`] when no remote client was injected
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let remote_client = self.remote_client.ok_or_else(remote_client_missing_error)?;

        let config = CoreConfig {
            database_path,
            remote_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cache_lifetimes: self.cache_lifetimes.unwrap_or_default(),
            history: self.history.unwrap_or_default(),
            refresh: self.refresh.unwrap_or_default(),
            store: self.store.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
