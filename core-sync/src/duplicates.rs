//! Duplicate detection for display
//!
//! A single left-to-right pass: the first occurrence of a song stays
//! unmarked, every later occurrence gets `is_duplicate = true`.

use core_library::models::{Track, TrackKey};
use std::collections::HashSet;

/// Flag repeated songs in place and return the keys of the flagged tracks.
///
/// Flags left over from an earlier pass are cleared, so the result only
/// reflects the current order of `tracks`.
pub fn flag_duplicates(tracks: &mut [Track]) -> Vec<TrackKey> {
    let mut seen: HashSet<String> = HashSet::with_capacity(tracks.len());
    let mut flagged = Vec::new();

    for track in tracks.iter_mut() {
        track.is_duplicate = !seen.insert(track.song.id.clone());
        if track.is_duplicate {
            flagged.push(track.key());
        }
    }

    flagged
}
