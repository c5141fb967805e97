// src/audio/sample_capture.rs
//! A wrapper source that taps decoded audio on its way to the output.
//!
//! Runs on the render thread: it never blocks. Samples are downmixed to
//! mono and handed to the analysis worker through a lock-free ring; if the
//! producer half is momentarily held elsewhere the block is dropped.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ringbuf::{HeapProd, traits::*};
use rodio::Source;

use super::session::{RenderClock, SessionId};

/// Mono frames buffered locally before each hand-off.
const FLUSH_FRAMES: usize = 256;

/// Producer half of the capture ring, shared by successive segments.
pub type CaptureProducer = Arc<Mutex<HeapProd<f32>>>;

/// A wrapper source that captures samples into a ring buffer while passing them through.
pub struct SampleCapture<S> {
    source: S,
    channels: u16,
    producer: CaptureProducer,
    pending: [f32; FLUSH_FRAMES],
    pending_len: usize,
    frame_sum: f32,
    channel_pos: u16,
    clock: Arc<RenderClock>,
    session: SessionId,
    on_finished: Option<Sender<SessionId>>,
}

impl<S> SampleCapture<S>
where
    S: Source<Item = f32>,
{
    /// Wrap `source`. `clock` counts rendered frames and `on_finished`
    /// receives `session` once the source is exhausted.
    pub fn new(
        source: S,
        producer: CaptureProducer,
        clock: Arc<RenderClock>,
        session: SessionId,
        on_finished: Sender<SessionId>,
    ) -> Self {
        let channels = source.channels().max(1);
        Self {
            source,
            channels,
            producer,
            pending: [0.0; FLUSH_FRAMES],
            pending_len: 0,
            frame_sum: 0.0,
            channel_pos: 0,
            clock,
            session,
            on_finished: Some(on_finished),
        }
    }

    fn capture(&mut self, sample: f32) {
        self.frame_sum += sample;
        self.channel_pos += 1;
        if self.channel_pos < self.channels {
            return;
        }

        self.pending[self.pending_len] = self.frame_sum / self.channels as f32;
        self.pending_len += 1;
        self.frame_sum = 0.0;
        self.channel_pos = 0;
        self.clock.advance(1);

        if self.pending_len == FLUSH_FRAMES {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending_len == 0 {
            return;
        }
        // A full ring drops the newest block; the analysis worker is behind anyway.
        if let Ok(mut producer) = self.producer.try_lock() {
            producer.push_slice(&self.pending[..self.pending_len]);
        }
        self.pending_len = 0;
    }

    fn finish(&mut self) {
        self.flush();
        if let Some(tx) = self.on_finished.take() {
            let _ = tx.send(self.session);
        }
    }
}

impl<S> Iterator for SampleCapture<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        match self.source.next() {
            Some(sample) => {
                self.capture(sample);
                Some(sample)
            }
            None => {
                self.finish();
                None
            }
        }
    }
}

impl<S> Source for SampleCapture<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.source.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.source.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.source.total_duration()
    }
}
