//! # Bridge Traits
//!
//! Contracts between the mirror core and the collaborators it does not own.
//!
//! ## Overview
//!
//! - [`RemoteMusicClient`](remote::RemoteMusicClient) - the remote music
//!   service. Implementations translate transport failures into the typed
//!   [`RemoteError`] taxonomy so callers never inspect message strings.
//! - [`Clock`](time::Clock) - injectable time source, with
//!   [`ManualClock`](time::ManualClock) for deterministic tests.
//!
//! The persisted store contract lives in `core-library` as repository traits.

pub mod error;
pub mod remote;
pub mod time;

pub use error::{RemoteError, Result};
pub use remote::{
    AddTracksStatus, RemoteAlbum, RemoteAlbumRef, RemoteArtist, RemoteArtistRef,
    RemoteHistoryItem, RemoteMusicClient, RemotePlaylist, RemotePlaylistItem,
    RemotePlaylistSummary, RemoteSong, RemoteThumbnail,
};
pub use time::{Clock, ManualClock, SystemClock};
