//! Resource kinds served through the generic [`ResourceAccessor`](crate::accessor::ResourceAccessor).
//!
//! Each kind only says how to read, fetch and persist its own data; caching,
//! freshness, single-flight and error mapping live in the accessor.

pub mod album;
pub mod artist;
pub mod history;
pub mod library;
pub mod playlist;
pub mod song;
pub mod thumbnail;

pub use album::AlbumKind;
pub use artist::ArtistKind;
pub use history::HistoryKind;
pub use library::LibraryKind;
pub use playlist::{snapshot_from_remote, PlaylistKind};
pub use song::SongKind;
pub use thumbnail::ThumbnailKind;
