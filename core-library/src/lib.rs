//! # Mirror Store
//!
//! Owns the local copy of the remote music library and the freshness
//! records that certify it.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite database schema and migrations
//! - Repository traits and SQLite implementations for songs, albums,
//!   artists, playlists, thumbnails, the action log and listening history
//! - Connection-level write functions so multi-entity changes can share a
//!   transaction
//! - The [`FreshnessPolicy`](freshness::FreshnessPolicy) that gates every read

pub mod db;
pub mod error;
pub mod freshness;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use freshness::FreshnessPolicy;
