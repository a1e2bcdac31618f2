//! Integration tests for the core service façade
//!
//! A scripted in-process remote stands in for the music service. The tests
//! cover:
//! - Freshness gating, forced refresh and stale playlist removal
//! - Session renewal through the guard
//! - Batch thumbnail lookups without remote calls
//! - Single-flight collapsing of concurrent refreshes
//! - The history pseudo-playlist
//! - Playlist editing with its audit trail
//! - Bulk refresh reporting

use async_trait::async_trait;
use bridge_traits::remote::{
    AddTracksStatus, RemoteAlbum, RemoteAlbumRef, RemoteArtist, RemoteHistoryItem, RemotePlaylist,
    RemotePlaylistItem, RemotePlaylistSummary, RemoteSong, RemoteThumbnail,
};
use bridge_traits::time::ManualClock;
use bridge_traits::{RemoteError, RemoteMusicClient, Result as RemoteResult};
use chrono::{Duration, TimeZone, Utc};
use core_library::db::create_test_pool;
use core_library::models::{
    ActionKind, ActionOrigin, Playlist, ResourceType, Track, TrackKey, HISTORY_PLAYLIST_ID,
};
use core_runtime::config::CoreConfig;
use core_service::{CoreContext, CoreService, ErrorKind};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Scripted remote
// ============================================================================

#[derive(Default)]
struct ScriptedRemote {
    songs: Mutex<HashMap<String, RemoteSong>>,
    playlists: Mutex<Vec<RemotePlaylist>>,
    albums: Mutex<HashMap<String, RemoteAlbum>>,
    feed: Mutex<Vec<RemoteHistoryItem>>,
    /// Playlists whose fetch fails as unreachable
    broken: Mutex<HashSet<String>>,
    /// Songs the service refuses to add
    refused: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    expire_next: AtomicBool,
    renewals: AtomicUsize,
    next_instance: AtomicUsize,
}

impl ScriptedRemote {
    fn with_songs(ids: &[&str]) -> Self {
        let remote = Self::default();
        {
            let mut songs = remote.songs.lock().unwrap();
            for id in ids {
                songs.insert(id.to_string(), remote_song(id));
            }
        }
        remote
    }

    fn song(&self, id: &str) -> RemoteSong {
        self.songs.lock().unwrap().get(id).cloned().unwrap()
    }

    fn put_playlist(&self, id: &str, title: &str, song_ids: &[&str]) {
        let tracks = song_ids.iter().map(|s| self.item(s)).collect();
        let mut playlists = self.playlists.lock().unwrap();
        playlists.retain(|p| p.id != id);
        playlists.push(RemotePlaylist {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            thumbnails: Vec::new(),
            track_count: None,
            tracks,
        });
    }

    fn drop_playlist(&self, id: &str) {
        self.playlists.lock().unwrap().retain(|p| p.id != id);
    }

    fn item(&self, song_id: &str) -> RemotePlaylistItem {
        let n = self.next_instance.fetch_add(1, Ordering::SeqCst);
        RemotePlaylistItem {
            song: self.song(song_id),
            instance_id: format!("set-{}", n),
        }
    }

    fn set_feed(&self, entries: &[(&str, &str)]) {
        *self.feed.lock().unwrap() = entries
            .iter()
            .map(|(id, played)| RemoteHistoryItem {
                song: self.song(id),
                played: played.to_string(),
            })
            .collect();
    }

    fn count(&self, method: &'static str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    /// Record a call and fail it once if an expiry is scripted.
    fn enter(&self, method: &'static str) -> RemoteResult<()> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
        if self.expire_next.swap(false, Ordering::SeqCst) {
            return Err(RemoteError::SessionExpired);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteMusicClient for ScriptedRemote {
    async fn get_library_playlists(&self) -> RemoteResult<Vec<RemotePlaylistSummary>> {
        self.enter("get_library_playlists")?;
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .iter()
            .map(|p| RemotePlaylistSummary {
                id: p.id.clone(),
                title: p.title.clone(),
                description: p.description.clone(),
                thumbnails: Vec::new(),
                track_count: Some(p.tracks.len() as i64),
            })
            .collect())
    }

    async fn get_playlist(&self, playlist_id: &str) -> RemoteResult<RemotePlaylist> {
        self.enter("get_playlist")?;
        if self.broken.lock().unwrap().contains(playlist_id) {
            return Err(RemoteError::Unreachable("connection reset".to_string()));
        }
        self.playlists
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == playlist_id)
            .cloned()
            .ok_or_else(|| RemoteError::not_found("playlist", playlist_id))
    }

    async fn get_song(&self, song_id: &str) -> RemoteResult<RemoteSong> {
        self.enter("get_song")?;
        self.songs
            .lock()
            .unwrap()
            .get(song_id)
            .cloned()
            .ok_or_else(|| RemoteError::not_found("song", song_id))
    }

    async fn get_album(&self, album_id: &str) -> RemoteResult<RemoteAlbum> {
        self.enter("get_album")?;
        self.albums
            .lock()
            .unwrap()
            .get(album_id)
            .cloned()
            .ok_or_else(|| RemoteError::not_found("album", album_id))
    }

    async fn get_artist(&self, artist_id: &str) -> RemoteResult<RemoteArtist> {
        self.enter("get_artist")?;
        Err(RemoteError::not_found("artist", artist_id))
    }

    async fn get_recent_history(&self) -> RemoteResult<Vec<RemoteHistoryItem>> {
        self.enter("get_recent_history")?;
        Ok(self.feed.lock().unwrap().clone())
    }

    async fn add_tracks(&self, playlist_id: &str, song_ids: &[String]) -> RemoteResult<Vec<AddTracksStatus>> {
        self.enter("add_tracks")?;
        let refused = self.refused.lock().unwrap().clone();
        let mut statuses = Vec::with_capacity(song_ids.len());
        let mut new_items = Vec::new();
        {
            let playlists = self.playlists.lock().unwrap();
            let playlist = playlists
                .iter()
                .find(|p| p.id == playlist_id)
                .ok_or_else(|| RemoteError::not_found("playlist", playlist_id))?;

            for song_id in song_ids {
                if refused.contains(song_id) {
                    statuses.push(AddTracksStatus::Failed("not available in region".to_string()));
                } else if song_ids.len() == 1 && playlist.tracks.iter().any(|t| &t.song.id == song_id) {
                    statuses.push(AddTracksStatus::AlreadyPresent);
                } else {
                    new_items.push(song_id.clone());
                    statuses.push(AddTracksStatus::Succeeded);
                }
            }
        }

        let items: Vec<RemotePlaylistItem> = new_items.iter().map(|id| self.item(id)).collect();
        let mut playlists = self.playlists.lock().unwrap();
        if let Some(playlist) = playlists.iter_mut().find(|p| p.id == playlist_id) {
            playlist.tracks.extend(items);
        }
        Ok(statuses)
    }

    async fn remove_tracks(&self, playlist_id: &str, instance_ids: &[String]) -> RemoteResult<()> {
        self.enter("remove_tracks")?;
        let mut playlists = self.playlists.lock().unwrap();
        let playlist = playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or_else(|| RemoteError::not_found("playlist", playlist_id))?;
        playlist.tracks.retain(|t| !instance_ids.contains(&t.instance_id));
        Ok(())
    }

    async fn create_playlist(&self, title: &str, _description: &str) -> RemoteResult<String> {
        self.enter("create_playlist")?;
        let id = format!("PL-created-{}", self.next_instance.fetch_add(1, Ordering::SeqCst));
        self.put_playlist(&id, title, &[]);
        Ok(id)
    }

    async fn delete_playlist(&self, playlist_id: &str) -> RemoteResult<()> {
        self.enter("delete_playlist")?;
        let mut playlists = self.playlists.lock().unwrap();
        let before = playlists.len();
        playlists.retain(|p| p.id != playlist_id);
        if playlists.len() == before {
            return Err(RemoteError::not_found("playlist", playlist_id));
        }
        Ok(())
    }

    async fn reestablish_session(&self) -> RemoteResult<()> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn remote_song(id: &str) -> RemoteSong {
    RemoteSong {
        id: id.to_string(),
        title: format!("Song {}", id),
        artists: Vec::new(),
        album: None,
        duration_secs: Some(200),
        explicit: false,
        is_local: false,
        thumbnails: vec![RemoteThumbnail {
            url: format!("https://img.example/{}=w60-h60", id),
            width: Some(60),
            height: Some(60),
        }],
    }
}

struct Harness {
    service: CoreService,
    remote: Arc<ScriptedRemote>,
    clock: Arc<ManualClock>,
}

async fn harness(remote: ScriptedRemote) -> Harness {
    let remote = Arc::new(remote);
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap()));
    let config = CoreConfig::builder()
        .in_memory_database()
        .remote_client(remote.clone())
        .clock(clock.clone())
        .build()
        .unwrap();

    let pool = create_test_pool().await.unwrap();
    let service = CoreService::from_context(CoreContext::with_pool(&config, pool));
    Harness { service, remote, clock }
}

fn song_ids(playlist: &Playlist) -> Vec<&str> {
    playlist.tracks.iter().map(Track::stable_id).collect()
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_fresh_playlist_is_served_locally() {
    let remote = ScriptedRemote::with_songs(&["A", "B"]);
    remote.put_playlist("PL1", "Mix", &["A", "B"]);
    let h = harness(remote).await;

    let first = h.service.get_playlist("PL1", false).await.unwrap();
    let second = h.service.get_playlist("PL1", false).await.unwrap();

    assert_eq!(song_ids(&first), vec!["A", "B"]);
    assert_eq!(first, second);
    assert_eq!(h.remote.count("get_playlist"), 1);

    h.clock.advance(Duration::hours(25));
    h.service.get_playlist("PL1", false).await.unwrap();
    assert_eq!(h.remote.count("get_playlist"), 2);
}

#[tokio::test]
async fn test_force_remote_bypasses_freshness() {
    let remote = ScriptedRemote::with_songs(&["A", "B"]);
    remote.put_playlist("PL1", "Mix", &["A"]);
    let h = harness(remote).await;

    h.service.get_playlist("PL1", false).await.unwrap();
    h.remote.put_playlist("PL1", "Mix", &["A", "B"]);

    let cached = h.service.get_playlist("PL1", false).await.unwrap();
    assert_eq!(song_ids(&cached), vec!["A"]);

    let forced = h.service.get_playlist("PL1", true).await.unwrap();
    assert_eq!(song_ids(&forced), vec!["A", "B"]);
    assert_eq!(h.remote.count("get_playlist"), 2);
}

#[tokio::test]
async fn test_rejected_snapshot_is_not_marked_fresh() {
    let remote = ScriptedRemote::with_songs(&["A", "B"]);
    remote.put_playlist("PL1", "Mix", &["A", "B"]);
    {
        let mut playlists = remote.playlists.lock().unwrap();
        let tracks = &mut playlists[0].tracks;
        tracks[1].instance_id = tracks[0].instance_id.clone();
    }
    let h = harness(remote).await;
    let freshness = &h.service.context().freshness;

    let err = h.service.get_playlist("PL1", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRemoteResponse);
    assert!(!freshness.is_fresh("PL1", ResourceType::Playlist).await.unwrap());

    let err = h.service.get_playlist("PL1", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRemoteResponse);
    assert_eq!(h.remote.count("get_playlist"), 2);

    h.remote.put_playlist("PL1", "Mix", &["A", "B"]);
    let playlist = h.service.get_playlist("PL1", false).await.unwrap();
    assert_eq!(song_ids(&playlist), vec!["A", "B"]);
    assert!(freshness.is_fresh("PL1", ResourceType::Playlist).await.unwrap());
    assert_eq!(h.remote.count("get_playlist"), 3);
}

#[tokio::test]
async fn test_playlist_gone_remotely_is_deleted_locally() {
    let remote = ScriptedRemote::with_songs(&["A"]);
    remote.put_playlist("PL1", "Mix", &["A"]);
    let h = harness(remote).await;

    h.service.get_playlist("PL1", false).await.unwrap();
    h.remote.drop_playlist("PL1");

    let err = h.service.get_playlist("PL1", true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleReference);
    assert_eq!(err.resource().map(|(_, id)| id), Some("PL1"));

    let ctx = h.service.context();
    assert!(ctx.playlists.find_by_id("PL1").await.unwrap().is_none());

    let log = h.service.action_log("PL1").await.unwrap();
    let last = log.last().unwrap();
    assert_eq!(last.kind, ActionKind::DeletePlaylist);
    assert_eq!(last.origin, ActionOrigin::Local);
    assert_eq!(last.playlist_title.as_deref(), Some("Mix"));

    // Nothing left to certify: the next read goes remote again
    let err = h.service.get_playlist("PL1", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleReference);
    assert_eq!(h.remote.count("get_playlist"), 3);
}

#[tokio::test]
async fn test_expired_session_is_renewed_and_call_retried() {
    let remote = ScriptedRemote::with_songs(&["A"]);
    remote.put_playlist("PL1", "Mix", &["A"]);
    let h = harness(remote).await;

    h.remote.expire_next.store(true, Ordering::SeqCst);
    let playlist = h.service.get_playlist("PL1", false).await.unwrap();

    assert_eq!(song_ids(&playlist), vec!["A"]);
    assert_eq!(h.remote.renewals.load(Ordering::SeqCst), 1);
    assert_eq!(h.remote.count("get_playlist"), 2);
}

#[tokio::test]
async fn test_thumbnail_batch_never_calls_remote() {
    let remote = ScriptedRemote::with_songs(&["A"]);
    remote.put_playlist("PL1", "Mix", &["A"]);
    let h = harness(remote).await;
    h.service.get_playlist("PL1", false).await.unwrap();
    let calls_before = h.remote.count("get_playlist");

    let ids = vec![
        "https://img.example/A=w544-h544".to_string(),
        "https://img.example/unknown=w60".to_string(),
        "https://img.example/A=s120".to_string(),
    ];
    let thumbnails = h.service.get_thumbnails(&ids, Some(120)).await.unwrap();

    assert_eq!(thumbnails.len(), 3);
    assert_eq!(thumbnails[0].id, "https://img.example/A");
    assert_eq!(thumbnails[0].url.as_deref(), Some("https://img.example/A"));
    assert_eq!(thumbnails[1].id, "https://img.example/unknown");
    assert!(thumbnails[1].url.is_none());
    assert_eq!(thumbnails[1].size, Some(120));
    assert_eq!(thumbnails[2], thumbnails[0]);
    assert_eq!(h.remote.count("get_playlist"), calls_before);

    h.service
        .mark_thumbnail_downloaded("https://img.example/A=w60-h60", "/cache/a.jpg", Some(60))
        .await
        .unwrap();
    let pending = h.service.pending_thumbnail_downloads(10).await.unwrap();
    assert!(pending.iter().all(|t| t.id != "https://img.example/A"));

    let single = h
        .service
        .get_thumbnail("https://img.example/A", None, false)
        .await
        .unwrap();
    assert!(single.downloaded);
    assert_eq!(single.file_path.as_deref(), Some("/cache/a.jpg"));
}

#[tokio::test]
async fn test_concurrent_reads_fetch_once() {
    let remote = ScriptedRemote::with_songs(&["A", "B"]);
    remote.put_playlist("PL1", "Mix", &["A", "B"]);
    let h = harness(remote).await;

    let (first, second) = tokio::join!(
        h.service.get_playlist("PL1", false),
        h.service.get_playlist("PL1", false)
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(h.remote.count("get_playlist"), 1);
}

#[tokio::test]
async fn test_library_lists_playlists_and_history_shell() {
    let remote = ScriptedRemote::with_songs(&["A", "B"]);
    remote.put_playlist("PL1", "Mix", &["A", "B"]);
    remote.put_playlist("PL2", "Chill", &[]);
    let h = harness(remote).await;

    h.service.get_playlist("PL1", false).await.unwrap();
    let library = h.service.get_library(false).await.unwrap();

    let ids: Vec<&str> = library.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["PL1", "PL2", HISTORY_PLAYLIST_ID]);
    assert_eq!(library[0].track_count, 2);
    assert_eq!(library[1].track_count, 0);

    h.service.get_library(false).await.unwrap();
    assert_eq!(h.remote.count("get_library_playlists"), 1);
}

#[tokio::test]
async fn test_duplicates_are_flagged_on_read() {
    let remote = ScriptedRemote::with_songs(&["A", "B", "C"]);
    remote.put_playlist("PL1", "Mix", &["A", "B", "A", "C", "A"]);
    let h = harness(remote).await;

    for force in [true, false] {
        let playlist = h.service.get_playlist("PL1", force).await.unwrap();
        let flags: Vec<bool> = playlist.tracks.iter().map(|t| t.is_duplicate).collect();
        assert_eq!(flags, vec![false, false, true, false, true]);
    }
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_history_imports_only_new_plays() {
    let remote = ScriptedRemote::with_songs(&["S1", "S2", "S3", "S4"]);
    remote.set_feed(&[("S3", "Today"), ("S2", "Yesterday"), ("S1", "Last week")]);
    let h = harness(remote).await;

    let history = h.service.get_history(false).await.unwrap();
    assert_eq!(history.id, HISTORY_PLAYLIST_ID);
    assert_eq!(song_ids(&history), vec!["S3", "S2", "S1"]);

    h.remote
        .set_feed(&[("S4", "Today"), ("S3", "Today"), ("S2", "Yesterday"), ("S1", "Last week")]);
    h.clock.advance(Duration::hours(13));

    let history = h.service.get_playlist(HISTORY_PLAYLIST_ID, false).await.unwrap();
    assert_eq!(song_ids(&history), vec!["S4", "S3", "S2", "S1"]);
    assert_eq!(h.remote.count("get_recent_history"), 2);
    assert_eq!(h.service.context().listening_history.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_history_repeat_play_is_flagged() {
    let remote = ScriptedRemote::with_songs(&["S1", "S2"]);
    remote.set_feed(&[("S1", "Today"), ("S2", "Today"), ("S1", "Yesterday")]);
    let h = harness(remote).await;

    let history = h.service.get_history(true).await.unwrap();

    let flags: Vec<bool> = history.tracks.iter().map(|t| t.is_duplicate).collect();
    assert_eq!(flags, vec![false, false, true]);
}

// ============================================================================
// Editing
// ============================================================================

#[tokio::test]
async fn test_add_songs_batches_new_and_checks_present_individually() {
    let remote = ScriptedRemote::with_songs(&["A", "B", "C"]);
    remote.put_playlist("PL1", "Mix", &["A", "B"]);
    let h = harness(remote).await;
    h.service.get_playlist("PL1", false).await.unwrap();

    let outcome = h
        .service
        .add_songs("PL1", &["C".to_string(), "A".to_string()])
        .await
        .unwrap();

    assert_eq!(outcome.added, vec!["C".to_string()]);
    assert_eq!(outcome.already_present, vec!["A".to_string()]);
    assert!(outcome.failed.is_empty());
    assert_eq!(h.remote.count("add_tracks"), 2);

    let playlist = h.service.get_playlist("PL1", false).await.unwrap();
    assert_eq!(song_ids(&playlist), vec!["A", "B", "C"]);

    let log = h.service.action_log("PL1").await.unwrap();
    let last = log.last().unwrap();
    assert_eq!(last.kind, ActionKind::AddSong);
    assert_eq!(last.song_id.as_deref(), Some("C"));
    assert!(last.succeeded);
}

#[tokio::test]
async fn test_refused_add_is_logged_as_failed() {
    let remote = ScriptedRemote::with_songs(&["A", "X"]);
    remote.put_playlist("PL1", "Mix", &["A"]);
    remote.refused.lock().unwrap().insert("X".to_string());
    let h = harness(remote).await;
    h.service.get_playlist("PL1", false).await.unwrap();

    let outcome = h.service.add_songs("PL1", &["X".to_string()]).await.unwrap();

    assert!(outcome.added.is_empty());
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].song_id, "X");

    let log = h.service.action_log("PL1").await.unwrap();
    let last = log.last().unwrap();
    assert_eq!(last.kind, ActionKind::AddSong);
    assert!(!last.succeeded);
    assert_eq!(last.song_id.as_deref(), Some("X"));
    // The unknown song was fetched so the entry could reference it
    assert_eq!(h.remote.count("get_song"), 1);
    // No successful add, no refresh
    assert_eq!(h.remote.count("get_playlist"), 1);
}

#[tokio::test]
async fn test_remove_songs_refreshes_and_audits() {
    let remote = ScriptedRemote::with_songs(&["A", "B"]);
    remote.put_playlist("PL1", "Mix", &["A", "B"]);
    let h = harness(remote).await;
    let playlist = h.service.get_playlist("PL1", false).await.unwrap();
    let key: TrackKey = playlist.tracks[0].key();

    let updated = h.service.remove_songs("PL1", &[key.clone()]).await.unwrap();

    assert_eq!(song_ids(&updated), vec!["B"]);
    assert_eq!(updated.tracks[0].position, 0);

    let log = h.service.action_log("PL1").await.unwrap();
    let last = log.last().unwrap();
    assert_eq!(last.kind, ActionKind::RemoveSong);
    assert_eq!(last.instance_id.as_deref(), Some(key.instance_id.as_str()));
}

#[tokio::test]
async fn test_create_then_delete_playlist() {
    let remote = ScriptedRemote::with_songs(&[]);
    let h = harness(remote).await;
    h.service.get_library(false).await.unwrap();

    let created = h.service.create_playlist("Road trip", "Long drives").await.unwrap();
    assert_eq!(created.title, "Road trip");
    assert_eq!(created.description.as_deref(), Some("Long drives"));

    let library = h.service.get_library(false).await.unwrap();
    assert!(library.iter().any(|p| p.id == created.id));
    assert_eq!(h.remote.count("get_library_playlists"), 2);

    h.service.delete_playlist(&created.id).await.unwrap();

    let kinds: Vec<ActionKind> = h
        .service
        .action_log(&created.id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![ActionKind::CreatePlaylist, ActionKind::DeletePlaylist]);

    let library = h.service.get_library(false).await.unwrap();
    assert!(library.iter().all(|p| p.id != created.id));
}

#[tokio::test]
async fn test_delete_of_remotely_missing_playlist_still_cleans_up() {
    let remote = ScriptedRemote::with_songs(&["A"]);
    remote.put_playlist("PL1", "Mix", &["A"]);
    let h = harness(remote).await;
    h.service.get_playlist("PL1", false).await.unwrap();
    h.remote.drop_playlist("PL1");

    h.service.delete_playlist("PL1").await.unwrap();

    assert!(h.service.context().playlists.find_by_id("PL1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_editing_rejects_bad_input() {
    let h = harness(ScriptedRemote::with_songs(&[])).await;

    let err = h.service.create_playlist("  ", "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = h
        .service
        .add_songs(HISTORY_PLAYLIST_ID, &["A".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = h.service.remove_songs("PL1", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(h.remote.count("create_playlist"), 0);
}

// ============================================================================
// Reconcile and bulk refresh
// ============================================================================

#[tokio::test]
async fn test_reconcile_playlist_certifies_snapshot() {
    let remote = ScriptedRemote::with_songs(&["A"]);
    let h = harness(remote).await;

    let mut snapshot = Playlist::new("PL9", "Imported");
    snapshot.tracks = vec![Track::new(
        core_library::models::Song::from(&remote_song("A")),
        "set-x",
        0,
    )];

    let err = h.service.reconcile_playlist("PL8", &snapshot).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let changes = h.service.reconcile_playlist("PL9", &snapshot).await.unwrap();
    assert_eq!(changes.added, vec![TrackKey::new("A", "set-x")]);

    let stored = h.service.get_playlist("PL9", false).await.unwrap();
    assert_eq!(song_ids(&stored), vec!["A"]);
    assert_eq!(h.remote.count("get_playlist"), 0);
}

#[tokio::test]
async fn test_refresh_all_collects_failures() {
    let remote = ScriptedRemote::with_songs(&["A", "B"]);
    {
        let mut songs = remote.songs.lock().unwrap();
        songs.get_mut("A").unwrap().album = Some(RemoteAlbumRef {
            id: "AL1".to_string(),
            name: "First".to_string(),
        });
        songs.get_mut("B").unwrap().album = Some(RemoteAlbumRef {
            id: "MPREb_privately_owned_9".to_string(),
            name: "Upload".to_string(),
        });
    }
    remote.albums.lock().unwrap().insert(
        "AL1".to_string(),
        RemoteAlbum {
            id: "AL1".to_string(),
            title: "First".to_string(),
            description: None,
            thumbnails: Vec::new(),
            audio_playlist_id: Some("OLAK-AL1".to_string()),
            year: Some(2020),
            track_count: Some(1),
            duration_secs: Some(200),
            artists: Vec::new(),
            tracks: Vec::new(),
        },
    );
    remote.put_playlist("PL1", "Mix", &["A", "B"]);
    remote.put_playlist("LM", "Liked", &["A"]);
    remote.put_playlist("PLX", "Broken", &[]);
    remote.broken.lock().unwrap().insert("PLX".to_string());
    let h = harness(remote).await;

    let report = h.service.refresh_all().await.unwrap();

    assert_eq!(report.playlists_refreshed, 1);
    assert_eq!(report.albums_hydrated, 1);
    assert!(report.skipped.contains(&"LM".to_string()));
    assert!(report.skipped.contains(&"MPREb_privately_owned_9".to_string()));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, "PLX");
    assert_eq!(report.failures[0].kind, ErrorKind::RemoteUnavailable);
    assert!(!report.is_clean());

    let album = h.service.get_album("AL1", false).await.unwrap();
    assert!(album.is_hydrated());
    assert_eq!(h.remote.count("get_album"), 1);
}

#[tokio::test]
async fn test_bootstrap_opens_in_memory_store() {
    let remote: Arc<dyn RemoteMusicClient> = Arc::new(ScriptedRemote::with_songs(&[]));
    let config = CoreConfig::builder()
        .in_memory_database()
        .remote_client(remote)
        .build()
        .unwrap();

    let service = CoreService::bootstrap(config).await.unwrap();
    let library = service.get_library(false).await.unwrap();

    assert_eq!(library.len(), 1);
    assert_eq!(library[0].id, HISTORY_PLAYLIST_ID);
}
