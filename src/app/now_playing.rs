// src/app/now_playing.rs
//! Now-playing information pushed to an external sink, and the intents
//! that sink can send back.

use tracing::info;

use crate::audio::AudioSource;

const UNKNOWN: &str = "Unknown";

/// What an external "now playing" display shows.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingSnapshot {
    pub title: String,
    pub artist: String,
    pub artwork: Option<Vec<u8>>,
    /// Seconds.
    pub duration: f64,
    /// Seconds.
    pub current_time: f64,
    pub is_playing: bool,
}

impl NowPlayingSnapshot {
    pub fn from_source(
        source: &dyn AudioSource,
        duration: f64,
        current_time: f64,
        is_playing: bool,
    ) -> Self {
        let duration = if duration > 0.0 {
            duration
        } else {
            source
                .duration_hint()
                .map(|d| d.as_secs_f64())
                .unwrap_or_default()
        };
        Self {
            title: source.title().unwrap_or(UNKNOWN).to_owned(),
            artist: source.artist().unwrap_or(UNKNOWN).to_owned(),
            artwork: source.artwork().map(<[u8]>::to_vec),
            duration,
            current_time,
            is_playing,
        }
    }
}

/// Receiver of now-playing updates (lock screen, media keys, status bar).
pub trait NowPlayingSink: Send {
    fn update(&mut self, snapshot: &NowPlayingSnapshot);

    fn clear(&mut self);
}

/// Sink that only logs.
#[derive(Debug, Default)]
pub struct LogNowPlaying;

impl NowPlayingSink for LogNowPlaying {
    fn update(&mut self, snapshot: &NowPlayingSnapshot) {
        info!(
            title = %snapshot.title,
            artist = %snapshot.artist,
            position = format_args!("{:.1}/{:.1}", snapshot.current_time, snapshot.duration),
            playing = snapshot.is_playing,
            "now playing"
        );
    }

    fn clear(&mut self) {
        info!("now playing cleared");
    }
}

/// User intents arriving from a remote control surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    TogglePlayPause,
    Next,
    Previous,
    /// Absolute position in seconds.
    SeekTo(f64),
}
