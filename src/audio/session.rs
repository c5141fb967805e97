// src/audio/session.rs
//! Per-play bookkeeping: session identifiers, the render clock and the
//! active session record.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::access::AccessLease;

/// Token minted for every play or seek. Callbacks carrying an older token
/// are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const NONE: SessionId = SessionId(0);

    pub fn next(self) -> SessionId {
        SessionId(self.0.wrapping_add(1).max(1))
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub(crate) fn from_raw(raw: u64) -> SessionId {
        SessionId(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Frames pulled by the output since a segment was scheduled.
///
/// Written by the render thread, read by the position poller.
#[derive(Debug, Default)]
pub struct RenderClock {
    frames: AtomicU64,
}

impl RenderClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }
}

/// One active decode + play cycle.
#[derive(Debug)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub url: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub total_frames: u64,
    /// Frame the current segment was scheduled from.
    pub seek_base: u64,
    pub clock: Arc<RenderClock>,
    /// Set once the decoder reports the current segment exhausted.
    pub segment_finished: bool,
    /// Dropping the session releases scoped access.
    pub(crate) _lease: AccessLease,
}

impl PlaybackSession {
    /// Absolute frame position from the render clock, clamped to the track length.
    pub fn current_frame(&self) -> u64 {
        (self.seek_base + self.clock.frames()).min(self.total_frames)
    }

    pub fn seconds_at(&self, frame: u64) -> f64 {
        frame as f64 / self.sample_rate.max(1) as f64
    }

    pub fn frame_at(&self, seconds: f64) -> u64 {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        ((seconds * self.sample_rate as f64).round() as u64).min(self.total_frames)
    }
}

pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64)
}
