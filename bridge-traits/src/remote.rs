//! Remote Music Service Abstraction
//!
//! The mirror never talks to the remote service directly. Host applications
//! inject a [`RemoteMusicClient`] that performs the actual calls and hands back
//! the plain data shapes defined here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One rendition of a remote image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteThumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Artist reference as it appears on a song or album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtistRef {
    pub id: String,
    pub name: String,
}

/// Album reference as it appears on a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbumRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSong {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<RemoteArtistRef>,
    pub album: Option<RemoteAlbumRef>,
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub explicit: bool,
    /// Uploaded by the user rather than part of the public catalog.
    #[serde(default)]
    pub is_local: bool,
    #[serde(default)]
    pub thumbnails: Vec<RemoteThumbnail>,
}

/// One occurrence of a song inside a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylistItem {
    pub song: RemoteSong,
    /// Occurrence identifier, unique within the playlist at a point in time.
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylistSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<RemoteThumbnail>,
    pub track_count: Option<i64>,
}

/// Full playlist snapshot. Track order is the playlist order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<RemoteThumbnail>,
    pub track_count: Option<i64>,
    #[serde(default)]
    pub tracks: Vec<RemotePlaylistItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<RemoteThumbnail>,
    /// Playlist id under which the album's tracks can be played.
    pub audio_playlist_id: Option<String>,
    pub year: Option<i32>,
    pub track_count: Option<i64>,
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub artists: Vec<RemoteArtistRef>,
    #[serde(default)]
    pub tracks: Vec<RemoteSong>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<RemoteThumbnail>,
    #[serde(default)]
    pub songs: Vec<RemoteSong>,
}

/// Entry of the "recently played" feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHistoryItem {
    pub song: RemoteSong,
    /// Coarse bucket label such as "Today" or "Last week".
    pub played: String,
}

/// Per-song result of an add request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddTracksStatus {
    Succeeded,
    AlreadyPresent,
    Failed(String),
}

/// Client for the remote music service.
///
/// Every method must report an expired session as
/// [`RemoteError::SessionExpired`](crate::RemoteError::SessionExpired) and a
/// missing resource as [`RemoteError::NotFound`](crate::RemoteError::NotFound).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote::RemoteMusicClient;
///
/// async fn titles(client: &dyn RemoteMusicClient) -> bridge_traits::Result<Vec<String>> {
///     let playlists = client.get_library_playlists().await?;
///     Ok(playlists.into_iter().map(|p| p.title).collect())
/// }
/// ```
#[async_trait]
pub trait RemoteMusicClient: Send + Sync {
    async fn get_library_playlists(&self) -> Result<Vec<RemotePlaylistSummary>>;

    async fn get_playlist(&self, playlist_id: &str) -> Result<RemotePlaylist>;

    async fn get_song(&self, song_id: &str) -> Result<RemoteSong>;

    async fn get_album(&self, album_id: &str) -> Result<RemoteAlbum>;

    async fn get_artist(&self, artist_id: &str) -> Result<RemoteArtist>;

    /// Most-recent-first feed of played songs.
    async fn get_recent_history(&self) -> Result<Vec<RemoteHistoryItem>>;

    /// Add songs to a playlist. The returned statuses follow `song_ids` order.
    async fn add_tracks(&self, playlist_id: &str, song_ids: &[String])
        -> Result<Vec<AddTracksStatus>>;

    async fn remove_tracks(&self, playlist_id: &str, instance_ids: &[String]) -> Result<()>;

    /// Create a playlist and return its id.
    async fn create_playlist(&self, title: &str, description: &str) -> Result<String>;

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;

    /// Recreate the client's credentials after a session expiry.
    async fn reestablish_session(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_defaults_when_optional_fields_missing() {
        let song: RemoteSong = serde_json::from_str(
            r#"{"id":"s1","title":"Song","album":null,"duration_secs":null}"#,
        )
        .unwrap();

        assert!(song.artists.is_empty());
        assert!(song.thumbnails.is_empty());
        assert!(!song.explicit);
        assert!(!song.is_local);
    }
}
