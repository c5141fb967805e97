// src/lib.rs
//! Vizplay - real-time audio playback with spectrum analysis.
//!
//! The library provides the playback engine, the analysis pipeline and a
//! small terminal front-end that drives them.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod ui;

pub use audio::{AudioSource, Engine, FileAudioSource, PlaybackState};
pub use config::EngineConfig;
pub use error::{ConfigError, PlaybackError, Result};
