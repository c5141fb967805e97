// src/audio/output.rs
//! The audio graph seen by the playback controller: one render node fed
//! by one scheduled segment at a time.

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::debug;

use super::sample_capture::SampleCapture;
use crate::error::{PlaybackError, Result};

/// Decoded audio from a start frame to the end of the file, tapped for analysis.
pub type Segment = SampleCapture<Box<dyn Source<Item = f32> + Send>>;

/// Output device abstraction driven by the playback controller.
///
/// Implementations need not be `Send`; the controller owns its output on
/// a single thread.
pub trait AudioOutput {
    /// Open the device if it is not already running.
    fn start(&mut self) -> Result<()>;

    /// Replace whatever is scheduled with `segment`, left paused.
    fn schedule(&mut self, segment: Segment) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Drop the scheduled segment.
    fn stop(&mut self);

    /// True while a segment is scheduled, unpaused and not yet drained.
    fn is_playing(&self) -> bool;

    /// Stop and release the device.
    fn shutdown(&mut self);
}

/// Default output using rodio's default device.
#[derive(Default)]
pub struct RodioOutput {
    stream: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
}

impl RodioOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioOutput for RodioOutput {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_none() {
            let stream = OutputStream::try_default()
                .map_err(|e| PlaybackError::EngineStartFailed(e.to_string()))?;
            debug!("opened default output stream");
            self.stream = Some(stream);
        }
        Ok(())
    }

    fn schedule(&mut self, segment: Segment) -> Result<()> {
        let (_, handle) = self
            .stream
            .as_ref()
            .ok_or_else(|| PlaybackError::EngineStartFailed("output not started".into()))?;
        let sink =
            Sink::try_new(handle).map_err(|e| PlaybackError::EngineStartFailed(e.to_string()))?;
        sink.pause();
        sink.append(segment);

        if let Some(old) = self.sink.replace(sink) {
            old.stop();
        }
        Ok(())
    }

    fn play(&mut self) {
        if let Some(s) = &self.sink {
            s.play();
        }
    }

    fn pause(&mut self) {
        if let Some(s) = &self.sink {
            s.pause();
        }
    }

    fn stop(&mut self) {
        if let Some(s) = self.sink.take() {
            s.stop();
        }
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|s| !s.is_paused() && !s.empty())
    }

    fn shutdown(&mut self) {
        self.stop();
        if self.stream.take().is_some() {
            debug!("closed output stream");
        }
    }
}
