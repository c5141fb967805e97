// src/ui/widgets/mod.rs
//! Custom widgets for the vizplay UI.

pub mod player_panel;
pub mod playlist;
pub mod spectrum;

// Re-export widget rendering functions
pub use player_panel::render_player_panel;
pub use playlist::render_playlist;
pub use spectrum::render_spectrum;
