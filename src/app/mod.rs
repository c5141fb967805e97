// src/app/mod.rs
//! Application module - contains application state and logic.

pub mod now_playing;
pub mod playlist;
pub mod state;

// Re-export the App struct
pub use now_playing::{LogNowPlaying, NowPlayingSink, NowPlayingSnapshot, RemoteCommand};
pub use playlist::PlaylistCursor;
pub use state::App;
