//! Domain models for the mirrored library
//!
//! Identifiers are assigned by the remote service and kept verbatim. The
//! structs here are what the core hands outward; database row types stay
//! private to the repositories.

use bridge_traits::remote::{
    RemoteAlbum, RemoteAlbumRef, RemoteArtist, RemoteArtistRef, RemotePlaylistItem, RemoteSong,
    RemoteThumbnail,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use core_runtime::config::CacheLifetimes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Id of the pseudo-playlist that exposes the listening history.
pub const HISTORY_PLAYLIST_ID: &str = "history";

/// Cache id of the library listing.
pub const LIBRARY_ID: &str = "library";

// =============================================================================
// Resource Types
// =============================================================================

/// Kinds of cached resources, each with its own freshness lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Library,
    Playlist,
    Song,
    Artist,
    Album,
    Thumbnail,
    History,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Library => "library",
            ResourceType::Playlist => "playlist",
            ResourceType::Song => "song",
            ResourceType::Artist => "artist",
            ResourceType::Album => "album",
            ResourceType::Thumbnail => "thumbnail",
            ResourceType::History => "history",
        }
    }

    /// Lifetime of a cached copy of this type.
    pub fn lifetime(&self, lifetimes: &CacheLifetimes) -> Duration {
        match self {
            ResourceType::Library => lifetimes.library,
            ResourceType::Playlist => lifetimes.playlist,
            ResourceType::Song => lifetimes.song,
            ResourceType::Artist => lifetimes.artist,
            ResourceType::Album => lifetimes.album,
            ResourceType::Thumbnail => lifetimes.thumbnail,
            ResourceType::History => lifetimes.history,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "library" => Ok(ResourceType::Library),
            "playlist" => Ok(ResourceType::Playlist),
            "song" => Ok(ResourceType::Song),
            "artist" => Ok(ResourceType::Artist),
            "album" => Ok(ResourceType::Album),
            "thumbnail" => Ok(ResourceType::Thumbnail),
            "history" => Ok(ResourceType::History),
            other => Err(format!("unknown resource type '{}'", other)),
        }
    }
}

/// Certificate that a resource was refreshed from remote at a given time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub resource_id: String,
    pub resource_type: ResourceType,
    /// Unix timestamp in milliseconds
    pub last_refreshed_at: i64,
}

// =============================================================================
// Catalog Entities
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: String,
    pub name: String,
}

impl From<&RemoteArtistRef> for ArtistRef {
    fn from(remote: &RemoteArtistRef) -> Self {
        Self {
            id: remote.id.clone(),
            name: remote.name.clone(),
        }
    }
}

impl From<&RemoteAlbumRef> for AlbumRef {
    fn from(remote: &RemoteAlbumRef) -> Self {
        Self {
            id: remote.id.clone(),
            name: remote.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub title: String,
    pub album: Option<AlbumRef>,
    pub artists: Vec<ArtistRef>,
    pub duration_secs: Option<i64>,
    pub explicit: bool,
    pub is_local: bool,
    pub thumbnail_id: Option<String>,
}

impl From<&RemoteSong> for Song {
    fn from(remote: &RemoteSong) -> Self {
        Self {
            id: remote.id.clone(),
            title: remote.title.clone(),
            album: remote.album.as_ref().map(AlbumRef::from),
            artists: remote.artists.iter().map(ArtistRef::from).collect(),
            duration_secs: remote.duration_secs,
            explicit: remote.explicit,
            is_local: remote.is_local,
            thumbnail_id: pick_thumbnail(&remote.thumbnails).map(|t| normalize_thumbnail_id(&t.url)),
        }
    }
}

/// Composite identity of a track within one playlist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackKey {
    /// Id of the underlying song
    pub stable_id: String,
    /// Id of this occurrence of the song in the playlist
    pub instance_id: String,
}

impl TrackKey {
    pub fn new(stable_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            stable_id: stable_id.into(),
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.stable_id, self.instance_id)
    }
}

/// One occurrence of a song in a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub song: Song,
    pub instance_id: String,
    pub position: i64,
    /// Set when an earlier track of the same playlist has the same song.
    pub is_duplicate: bool,
}

impl Track {
    pub fn new(song: Song, instance_id: impl Into<String>, position: i64) -> Self {
        Self {
            song,
            instance_id: instance_id.into(),
            position,
            is_duplicate: false,
        }
    }

    /// Build a track from a remote playlist item at `position`.
    pub fn from_remote(item: &RemotePlaylistItem, position: i64) -> Self {
        Self::new(Song::from(&item.song), item.instance_id.clone(), position)
    }

    pub fn stable_id(&self) -> &str {
        &self.song.id
    }

    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.song.id.clone(), self.instance_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_id: Option<String>,
    /// Number of tracks; for summaries this is counted from stored tracks.
    pub track_count: i64,
    pub tracks: Vec<Track>,
}

impl Playlist {
    /// Create an empty playlist shell
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            thumbnail_id: None,
            track_count: 0,
            tracks: Vec::new(),
        }
    }

    /// Validate playlist data
    ///
    /// Instance ids must be unique within one playlist.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Playlist id cannot be empty".to_string());
        }

        let mut seen = HashSet::with_capacity(self.tracks.len());
        for track in &self.tracks {
            if !seen.insert(track.instance_id.as_str()) {
                return Err(format!(
                    "Instance id '{}' appears more than once in playlist {}",
                    track.instance_id, self.id
                ));
            }
        }

        Ok(())
    }

    pub fn keys(&self) -> Vec<TrackKey> {
        self.tracks.iter().map(Track::key).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub thumbnail_id: Option<String>,
    /// Playlist id of the album's tracks; known only once hydrated.
    pub audio_playlist_id: Option<String>,
    pub year: Option<i32>,
    pub track_count: Option<i64>,
    pub duration_secs: Option<i64>,
    pub artists: Vec<ArtistRef>,
    pub songs: Vec<Song>,
}

impl Album {
    /// Partially known album, as referenced from a song.
    pub fn from_ref(album: &AlbumRef) -> Self {
        Self {
            id: album.id.clone(),
            name: album.name.clone(),
            description: None,
            thumbnail_id: None,
            audio_playlist_id: None,
            year: None,
            track_count: None,
            duration_secs: None,
            artists: Vec::new(),
            songs: Vec::new(),
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.audio_playlist_id.is_some()
    }
}

impl From<&RemoteAlbum> for Album {
    fn from(remote: &RemoteAlbum) -> Self {
        let album_ref = AlbumRef {
            id: remote.id.clone(),
            name: remote.title.clone(),
        };

        Self {
            id: remote.id.clone(),
            name: remote.title.clone(),
            description: remote.description.clone(),
            thumbnail_id: pick_thumbnail(&remote.thumbnails).map(|t| normalize_thumbnail_id(&t.url)),
            audio_playlist_id: remote.audio_playlist_id.clone(),
            year: remote.year,
            track_count: remote.track_count,
            duration_secs: remote.duration_secs,
            artists: remote.artists.iter().map(ArtistRef::from).collect(),
            songs: remote
                .tracks
                .iter()
                .map(|track| {
                    let mut song = Song::from(track);
                    // Album pages omit the album on their own tracks
                    song.album.get_or_insert_with(|| album_ref.clone());
                    song
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub thumbnail_id: Option<String>,
    pub songs: Vec<Song>,
}

impl Artist {
    pub fn from_ref(artist: &ArtistRef) -> Self {
        Self {
            id: artist.id.clone(),
            name: artist.name.clone(),
            description: None,
            thumbnail_id: None,
            songs: Vec::new(),
        }
    }
}

impl From<&RemoteArtist> for Artist {
    fn from(remote: &RemoteArtist) -> Self {
        Self {
            id: remote.id.clone(),
            name: remote.name.clone(),
            description: remote.description.clone(),
            thumbnail_id: pick_thumbnail(&remote.thumbnails).map(|t| normalize_thumbnail_id(&t.url)),
            songs: remote.songs.iter().map(Song::from).collect(),
        }
    }
}

// =============================================================================
// Thumbnails
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    /// Normalized image identifier
    pub id: String,
    pub url: Option<String>,
    pub size: Option<i64>,
    pub downloaded: bool,
    pub file_path: Option<String>,
}

impl Thumbnail {
    /// Stand-in for a thumbnail that was never fetched.
    pub fn placeholder(id: &str, size: Option<i64>) -> Self {
        Self {
            id: normalize_thumbnail_id(id),
            url: None,
            size,
            downloaded: false,
            file_path: None,
        }
    }

    pub fn from_remote(remote: &RemoteThumbnail) -> Self {
        Self {
            id: normalize_thumbnail_id(&remote.url),
            url: Some(remote.url.clone()),
            size: remote.width.map(i64::from),
            downloaded: false,
            file_path: None,
        }
    }
}

/// Canonical identifier for a remote image URL.
///
/// Query strings, fragments and trailing size directives such as
/// `=w60-h60-l90-rj` are removed so every rendition of one image maps to the
/// same id.
pub fn normalize_thumbnail_id(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let base = &url[..end];

    let segment_start = base.rfind('/').map(|i| i + 1).unwrap_or(0);
    if let Some(eq) = base[segment_start..].rfind('=') {
        let directive = &base[segment_start + eq + 1..];
        let mut chars = directive.chars();
        let is_size = matches!(chars.next(), Some('w' | 'h' | 's'))
            && chars.next().is_some_and(|c| c.is_ascii_digit());
        if is_size {
            return base[..segment_start + eq].to_string();
        }
    }

    base.to_string()
}

/// Smallest rendition, which is what the thumbnail rows describe.
pub fn pick_thumbnail(thumbnails: &[RemoteThumbnail]) -> Option<&RemoteThumbnail> {
    thumbnails
        .iter()
        .min_by_key(|t| t.width.unwrap_or(u32::MAX))
}

// =============================================================================
// Audit Log
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    AddSong,
    RemoveSong,
    CreatePlaylist,
    DeletePlaylist,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::AddSong => "add_song",
            ActionKind::RemoveSong => "remove_song",
            ActionKind::CreatePlaylist => "create_playlist",
            ActionKind::DeletePlaylist => "delete_playlist",
        }
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_song" => Ok(ActionKind::AddSong),
            "remove_song" => Ok(ActionKind::RemoveSong),
            "create_playlist" => Ok(ActionKind::CreatePlaylist),
            "delete_playlist" => Ok(ActionKind::DeletePlaylist),
            other => Err(format!("unknown action kind '{}'", other)),
        }
    }
}

/// Where a recorded action happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionOrigin {
    /// Performed on, or detected from, the remote service
    Remote,
    /// Applied to the local mirror only
    Local,
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
    /// Assigned by the store
    pub id: Option<i64>,
    pub kind: ActionKind,
    /// Unix timestamp in milliseconds
    pub performed_at: i64,
    pub origin: ActionOrigin,
    pub succeeded: bool,
    pub playlist_id: String,
    pub playlist_title: Option<String>,
    pub song_id: Option<String>,
    pub song_title: Option<String>,
    pub instance_id: Option<String>,
}

impl ActionLogEntry {
    /// Entry about one song of a playlist.
    pub fn for_song(
        kind: ActionKind,
        origin: ActionOrigin,
        succeeded: bool,
        playlist: (&str, Option<&str>),
        song: &Song,
        instance_id: Option<&str>,
        performed_at: i64,
    ) -> Self {
        Self {
            id: None,
            kind,
            performed_at,
            origin,
            succeeded,
            playlist_id: playlist.0.to_string(),
            playlist_title: playlist.1.map(str::to_string),
            song_id: Some(song.id.clone()),
            song_title: Some(song.title.clone()),
            instance_id: instance_id.map(str::to_string),
        }
    }

    /// Entry about a playlist as a whole.
    pub fn for_playlist(
        kind: ActionKind,
        origin: ActionOrigin,
        succeeded: bool,
        playlist_id: &str,
        playlist_title: Option<&str>,
        performed_at: i64,
    ) -> Self {
        Self {
            id: None,
            kind,
            performed_at,
            origin,
            succeeded,
            playlist_id: playlist_id.to_string(),
            playlist_title: playlist_title.map(str::to_string),
            song_id: None,
            song_title: None,
            instance_id: None,
        }
    }
}

// =============================================================================
// Listening History
// =============================================================================

/// One row of the local listening log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Append order; higher is more recent
    pub sequence: i64,
    pub song_id: String,
    /// Unix timestamp in milliseconds
    pub listened_at: i64,
}

/// Coarse "when was it played" label from the remote feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayedBucket {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    Older,
}

impl PlayedBucket {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "today" => PlayedBucket::Today,
            "yesterday" => PlayedBucket::Yesterday,
            "this week" => PlayedBucket::ThisWeek,
            "last week" => PlayedBucket::LastWeek,
            _ => PlayedBucket::Older,
        }
    }

    pub fn days_ago(&self) -> i64 {
        match self {
            PlayedBucket::Today => 0,
            PlayedBucket::Yesterday => 1,
            PlayedBucket::ThisWeek => 2,
            PlayedBucket::LastWeek => 7,
            PlayedBucket::Older => 30,
        }
    }

    /// Listen timestamp (millis) for this bucket, counted back from midnight of `now`.
    ///
    /// Midnight is UTC midnight of `now`, not the host's local midnight.
    pub fn listened_at(&self, now: DateTime<Utc>) -> i64 {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        (midnight - ChronoDuration::days(self.days_ago())).timestamp_millis()
    }
}
