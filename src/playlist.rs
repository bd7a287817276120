use std::sync::Arc;

use crate::error::SlideshowError;
use crate::events::CacheEntry;

/// Immutable, fully-built list of cached entries.
///
/// Cloning is cheap; the engine swaps whole snapshots instead of editing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSnapshot {
    entries: Arc<[CacheEntry]>,
}

impl Default for PlaylistSnapshot {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PlaylistSnapshot {
    pub fn new(entries: Vec<CacheEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&CacheEntry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// A new snapshot with the entry at `position` left out.
    pub fn without(&self, position: usize) -> Self {
        Self::new(
            self.entries
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != position)
                .map(|(_, e)| e.clone())
                .collect(),
        )
    }
}

/// Cyclic cursor over the installed snapshot.
#[derive(Debug, Default)]
pub struct Playlist {
    snapshot: PlaylistSnapshot,
    position: usize,
}

impl Playlist {
    pub fn new(snapshot: PlaylistSnapshot) -> Self {
        Self {
            snapshot,
            position: 0,
        }
    }

    /// Replace the snapshot and re-clamp the cursor into the new range.
    pub fn install(&mut self, snapshot: PlaylistSnapshot) {
        self.position = match snapshot.len() {
            0 => 0,
            len => self.position % len,
        };
        self.snapshot = snapshot;
    }

    pub fn current(&self) -> Result<&CacheEntry, SlideshowError> {
        self.snapshot
            .get(self.position)
            .ok_or(SlideshowError::EmptyPlaylist)
    }

    pub fn advance(&mut self) {
        if !self.snapshot.is_empty() {
            self.position = (self.position + 1) % self.snapshot.len();
        }
    }

    /// Drop the current entry; the cursor lands on the entry that followed it.
    pub fn remove_current(&mut self) -> Option<CacheEntry> {
        let removed = self.snapshot.get(self.position)?.clone();
        let remaining = self.snapshot.without(self.position);
        self.install(remaining);
        Some(removed)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn snapshot(&self) -> &PlaylistSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MediaKind;
    use std::path::PathBuf;

    fn snapshot(len: usize) -> PlaylistSnapshot {
        PlaylistSnapshot::new(
            (0..len)
                .map(|index| CacheEntry {
                    index,
                    local_path: PathBuf::from(format!("photo_{index}.jpg")),
                    media_kind: MediaKind::StaticImage,
                })
                .collect(),
        )
    }

    #[test]
    fn advance_wraps_within_range() {
        for len in 1..6 {
            let mut playlist = Playlist::new(snapshot(len));
            for _ in 0..(len * 3 + 1) {
                playlist.advance();
                assert!(playlist.position() < len);
            }
        }
    }

    #[test]
    fn install_reclamps_position_when_shrinking() {
        let mut playlist = Playlist::new(snapshot(5));
        for _ in 0..4 {
            playlist.advance();
        }
        assert_eq!(playlist.position(), 4);

        playlist.install(snapshot(3));
        assert_eq!(playlist.position(), 1);
        assert_eq!(playlist.current().unwrap().index, 1);
    }

    #[test]
    fn install_empty_resets_cursor() {
        let mut playlist = Playlist::new(snapshot(2));
        playlist.advance();
        playlist.install(PlaylistSnapshot::default());
        assert_eq!(playlist.position(), 0);
        assert!(matches!(
            playlist.current(),
            Err(SlideshowError::EmptyPlaylist)
        ));
        playlist.advance();
        assert_eq!(playlist.position(), 0);
    }

    #[test]
    fn remove_current_moves_to_following_entry() {
        let mut playlist = Playlist::new(snapshot(3));
        playlist.advance();
        assert_eq!(playlist.remove_current().map(|e| e.index), Some(1));
        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.current().unwrap().index, 2);

        assert_eq!(playlist.remove_current().map(|e| e.index), Some(2));
        assert_eq!(playlist.position(), 0);
        assert_eq!(playlist.current().unwrap().index, 0);

        playlist.remove_current();
        assert!(playlist.is_empty());
        assert_eq!(playlist.remove_current(), None);
    }

    #[test]
    fn growing_keeps_position() {
        let mut playlist = Playlist::new(snapshot(2));
        playlist.advance();
        playlist.install(snapshot(6));
        assert_eq!(playlist.position(), 1);
    }
}
