//! Track list
//!
//! Ordered files the operator can step through. Explicit next/previous wrap
//! around the ends of the list; advancing after a track ends does not.

use std::path::{Path, PathBuf};

/// Tracks in play order, with the one currently selected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    tracks: Vec<PathBuf>,

    /// Index into `tracks`; None until a track is selected
    current: Option<usize>,
}

impl Playlist {
    pub fn new(tracks: Vec<PathBuf>) -> Self {
        Self {
            tracks,
            current: None,
        }
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.and_then(|i| self.tracks.get(i)).map(PathBuf::as_path)
    }

    pub fn path(&self, index: usize) -> Option<&Path> {
        self.tracks.get(index).map(PathBuf::as_path)
    }

    /// Make `index` current. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    /// Select `path`, appending it when not already listed. Returns its index.
    pub fn select_path(&mut self, path: &Path) -> usize {
        let index = match self.tracks.iter().position(|p| p == path) {
            Some(index) => index,
            None => {
                self.tracks.push(path.to_path_buf());
                self.tracks.len() - 1
            }
        };
        self.current = Some(index);
        index
    }

    /// Track after the current one, wrapping to the first.
    ///
    /// With nothing selected this is the first track.
    pub fn next_index(&self) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }
        Some(self.current.map_or(0, |i| (i + 1) % self.tracks.len()))
    }

    /// Track before the current one, wrapping to the last.
    ///
    /// With nothing selected this is the last track.
    pub fn previous_index(&self) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        Some(self.current.map_or(len - 1, |i| (i + len - 1) % len))
    }

    /// Track to continue with once the current one ends; None after the last
    pub fn following_index(&self) -> Option<usize> {
        let next = self.current? + 1;
        (next < self.tracks.len()).then_some(next)
    }
}
