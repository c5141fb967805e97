// src/app/playlist.rs
//! Ordered list of sources with a current position.

use std::sync::Arc;

use crate::audio::AudioSource;

/// A playlist and the index of the track the app considers current.
///
/// The index is always valid while the list is non-empty and `None`
/// when it is empty.
#[derive(Debug, Default, Clone)]
pub struct PlaylistCursor {
    items: Vec<Arc<dyn AudioSource>>,
    index: Option<usize>,
}

impl PlaylistCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list and select `start` (clamped into range).
    pub fn set_playlist(&mut self, items: Vec<Arc<dyn AudioSource>>, start: usize) {
        self.index = if items.is_empty() {
            None
        } else {
            Some(start.min(items.len() - 1))
        };
        self.items = items;
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index = None;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn items(&self) -> &[Arc<dyn AudioSource>] {
        &self.items
    }

    pub fn current_source(&self) -> Option<Arc<dyn AudioSource>> {
        self.index.and_then(|i| self.items.get(i)).cloned()
    }

    pub fn has_next(&self) -> bool {
        self.index.is_some_and(|i| i + 1 < self.items.len())
    }

    pub fn has_previous(&self) -> bool {
        self.index.is_some_and(|i| i > 0)
    }

    /// Advance one track. Returns false at the end of the list.
    pub fn move_to_next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.index = self.index.map(|i| i + 1);
        true
    }

    /// Step back one track. Returns false at the start of the list.
    pub fn move_to_previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.index = self.index.map(|i| i - 1);
        true
    }

    /// Jump to `index`; out-of-range requests are ignored.
    pub fn move_to_index(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.index = Some(index);
        true
    }
}
