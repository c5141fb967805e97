// src/audio/source.rs
//! Playable items: anything that can name itself and resolve to a file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::metadata::load_metadata;

/// Capability shared by every kind of playable item.
pub trait AudioSource: Send + Sync + fmt::Debug {
    /// Stable identity used to recognise the same item across calls.
    fn identity(&self) -> String;

    fn title(&self) -> Option<&str>;

    fn artist(&self) -> Option<&str>;

    fn duration_hint(&self) -> Option<Duration>;

    /// Encoded artwork bytes, if any.
    fn artwork(&self) -> Option<&[u8]>;

    /// Location the engine should decode, or `None` when the item cannot
    /// be played (e.g. a catalog entry without a local asset).
    fn playback_url(&self) -> Option<PathBuf>;
}

/// A file on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAudioSource {
    path: PathBuf,
    title: Option<String>,
    artist: Option<String>,
    duration: Option<Duration>,
    artwork: Option<Vec<u8>>,
}

impl FileAudioSource {
    /// Source with no tags; the title falls back to the file stem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = file_stem(&path);
        Self {
            path,
            title,
            artist: None,
            duration: None,
            artwork: None,
        }
    }

    /// Source populated from the file's tags, or bare if they cannot be read.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match load_metadata(&path) {
            Ok(meta) => {
                let mut source = Self::new(path);
                if meta.title.is_some() {
                    source.title = meta.title;
                }
                source.artist = meta.artist;
                source.duration = meta.duration;
                source.artwork = meta.artwork;
                source
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no readable tags");
                Self::new(path)
            }
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

impl AudioSource for FileAudioSource {
    fn identity(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    fn duration_hint(&self) -> Option<Duration> {
        self.duration
    }

    fn artwork(&self) -> Option<&[u8]> {
        self.artwork.as_deref()
    }

    fn playback_url(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// An entry from a media catalog. Protected or cloud-only entries have no
/// local asset and cannot be played.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryItem {
    pub persistent_id: u64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
    pub artwork: Option<Vec<u8>>,
    pub asset_path: Option<PathBuf>,
}

impl AudioSource for LibraryItem {
    fn identity(&self) -> String {
        format!("library://{}", self.persistent_id)
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    fn duration_hint(&self) -> Option<Duration> {
        self.duration
    }

    fn artwork(&self) -> Option<&[u8]> {
        self.artwork.as_deref()
    }

    fn playback_url(&self) -> Option<PathBuf> {
        self.asset_path.clone()
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}
