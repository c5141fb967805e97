// src/error.rs
//! Error types for the playback engine and its configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by transport operations.
///
/// Every variant is recoverable: the controller falls back to a
/// not-playing state before returning it.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The source did not resolve to a playable location.
    #[error("audio source has no playable location")]
    InvalidSource,

    /// Temporary access to the resource was refused.
    #[error("access denied to {}: {reason}", path.display())]
    AccessDenied { path: PathBuf, reason: String },

    /// The file could not be opened or decoded.
    #[error("failed to decode {}: {reason}", path.display())]
    DecodeFailed { path: PathBuf, reason: String },

    /// The output device or audio graph could not be started.
    #[error("audio output could not start: {0}")]
    EngineStartFailed(String),

    /// A callback arrived for a session that is no longer current.
    /// Only used internally to drop late notifications.
    #[error("callback belongs to a stale playback session")]
    SessionStale,

    /// The engine was given settings it cannot run with.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The engine worker thread is gone.
    #[error("playback engine is not running")]
    Disconnected,
}

impl PlaybackError {
    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DecodeFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn access(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::AccessDenied {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures while loading or validating an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Convenience result type for playback operations.
pub type Result<T, E = PlaybackError> = std::result::Result<T, E>;
