// src/audio/mod.rs
//! Audio module - handles all audio playback, metadata, and visualization.

pub mod access;
pub mod metadata;
pub mod output;
pub mod player;
pub mod sample_capture;
pub mod session;
pub mod source;
pub mod visualizer;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use access::{AccessLease, AccessPolicy, FilesystemAccess};
pub use metadata::TrackMetadata;
pub use output::{AudioOutput, RodioOutput};
pub use player::{Completion, Engine, PlaybackController, PlaybackState, PlaybackStatus};
pub use session::SessionId;
pub use source::{AudioSource, FileAudioSource, LibraryItem};
pub use visualizer::{SpectrumFeed, Visualizer};
