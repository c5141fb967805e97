// src/audio/access.rs
//! Scoped access to the resources a session reads from.

use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PlaybackError, Result};

/// Grants temporary read access to a playback location.
pub trait AccessPolicy: Send {
    /// Fails with [`PlaybackError::AccessDenied`] when the location may not be read.
    fn acquire(&self, path: &Path) -> Result<AccessLease>;
}

/// Held for the lifetime of a session; access is given back on drop.
pub struct AccessLease {
    path: PathBuf,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl AccessLease {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            release: None,
        }
    }

    /// Lease that runs `release` when dropped.
    pub fn with_release(path: impl Into<PathBuf>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            path: path.into(),
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for AccessLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        debug!(path = %self.path.display(), "released scoped access");
    }
}

impl fmt::Debug for AccessLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLease").field("path", &self.path).finish()
    }
}

/// Plain filesystem permissions. Only a permission error counts as a
/// refusal; a missing file is left for the decoder to report.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemAccess;

impl AccessPolicy for FilesystemAccess {
    fn acquire(&self, path: &Path) -> Result<AccessLease> {
        match File::open(path) {
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(PlaybackError::access(path, e))
            }
            _ => Ok(AccessLease::new(path)),
        }
    }
}
