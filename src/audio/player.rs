// src/audio/player.rs
//! Music playback engine using rodio with sample capture for visualization.
//!
//! [`PlaybackController`] is the state machine. It owns the output, the
//! open file and the active session, and is only ever touched by one
//! thread. [`Engine`] runs a controller on its own thread, funnels every
//! transport call through a command channel and publishes status for the
//! UI to poll.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use ringbuf::{HeapRb, traits::*};
use rodio::source::SeekError;
use rodio::{Decoder, Source};
use tracing::{debug, info, trace, warn};

use super::access::{AccessPolicy, FilesystemAccess};
use super::metadata::probe_duration;
use super::output::{AudioOutput, RodioOutput, Segment};
use super::sample_capture::{CaptureProducer, SampleCapture};
use super::session::{PlaybackSession, RenderClock, SessionId, frames_to_duration};
use super::source::AudioSource;
use super::visualizer::{AnalysisWorker, SpectrumFeed};
use crate::config::{EngineConfig, PlaybackConfig};
use crate::error::{PlaybackError, Result};

/// Transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Idle = 0,
    Loading = 1,
    Playing = 2,
    Paused = 3,
    Completing = 4,
    /// Explicitly stopped; behaves like `Idle`.
    Stopped = 5,
}

impl PlaybackState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Loading,
            2 => Self::Playing,
            3 => Self::Paused,
            4 => Self::Completing,
            5 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    /// True when no session is loaded.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }
}

/// Emitted once per session when its track plays to the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub session: SessionId,
    pub url: PathBuf,
}

/// Transport status published for UI polling.
///
/// Every field is individually atomic, so a reader never sees a torn
/// value even while the controller is mid-update.
#[derive(Debug)]
pub struct PlaybackStatus {
    state: AtomicU8,
    current_time: AtomicU64,
    duration: AtomicU64,
    session: AtomicU64,
    url: Mutex<Option<PathBuf>>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Idle as u8),
            current_time: AtomicU64::new(0f64.to_bits()),
            duration: AtomicU64::new(0f64.to_bits()),
            session: AtomicU64::new(SessionId::NONE.raw()),
            url: Mutex::new(None),
        }
    }
}

impl PlaybackStatus {
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Seconds into the current track, as last sampled from the render clock.
    pub fn current_time(&self) -> f64 {
        f64::from_bits(self.current_time.load(Ordering::Acquire))
    }

    pub fn duration(&self) -> f64 {
        f64::from_bits(self.duration.load(Ordering::Acquire))
    }

    pub fn session(&self) -> SessionId {
        SessionId::from_raw(self.session.load(Ordering::Acquire))
    }

    pub fn url(&self) -> Option<PathBuf> {
        self.url.lock().ok().and_then(|u| u.clone())
    }

    fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn set_time(&self, seconds: f64) {
        self.current_time.store(seconds.to_bits(), Ordering::Release);
    }

    fn set_duration(&self, seconds: f64) {
        self.duration.store(seconds.to_bits(), Ordering::Release);
    }

    fn set_session(&self, id: SessionId) {
        self.session.store(id.raw(), Ordering::Release);
    }

    fn set_url(&self, url: Option<PathBuf>) {
        if let Ok(mut slot) = self.url.lock() {
            *slot = url;
        }
    }
}

type FileDecoder = Decoder<BufReader<File>>;
type BoxedSamples = Box<dyn Source<Item = f32> + Send>;

/// Single-owner playback state machine.
pub struct PlaybackController<O: AudioOutput> {
    config: PlaybackConfig,
    output: O,
    access: Box<dyn AccessPolicy>,
    producer: CaptureProducer,
    feed: Arc<SpectrumFeed>,
    status: Arc<PlaybackStatus>,
    state: PlaybackState,
    session: Option<PlaybackSession>,
    last_id: SessionId,
    completion_latched: bool,
    segment_tx: Sender<SessionId>,
    segment_rx: Receiver<SessionId>,
    completions: Sender<Completion>,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(
        config: &EngineConfig,
        output: O,
        access: Box<dyn AccessPolicy>,
        producer: CaptureProducer,
        feed: Arc<SpectrumFeed>,
        completions: Sender<Completion>,
    ) -> Self {
        let (segment_tx, segment_rx) = mpsc::channel();
        Self {
            config: config.playback.clone(),
            output,
            access,
            producer,
            feed,
            status: Arc::new(PlaybackStatus::default()),
            state: PlaybackState::Idle,
            session: None,
            last_id: SessionId::NONE,
            completion_latched: false,
            segment_tx,
            segment_rx,
            completions,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn status(&self) -> Arc<PlaybackStatus> {
        self.status.clone()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Last sampled position in seconds.
    pub fn current_time(&self) -> f64 {
        self.status.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.status.duration()
    }

    /// Start playing `source` from the beginning.
    ///
    /// A no-op when `source` is already the one playing. On failure the
    /// controller is left idle with nothing scheduled and no access held.
    pub fn play(&mut self, source: &dyn AudioSource) -> Result<()> {
        let Some(url) = source.playback_url() else {
            warn!(source = %source.identity(), "play refused: no playable location");
            return Err(PlaybackError::InvalidSource);
        };

        if self.state == PlaybackState::Playing
            && self.session.as_ref().is_some_and(|s| s.url == url)
        {
            debug!(url = %url.display(), "already playing");
            return Ok(());
        }

        self.teardown();
        self.feed.request_reset();
        self.set_state(PlaybackState::Loading);

        match self.open_session(url, source) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "play failed");
                self.teardown();
                self.status.set_time(0.0);
                self.status.set_duration(0.0);
                self.set_state(PlaybackState::Idle);
                Err(e)
            }
        }
    }

    fn open_session(&mut self, url: PathBuf, source: &dyn AudioSource) -> Result<()> {
        let lease = self.access.acquire(&url)?;
        let decoder = open_decoder(&url)?;
        let sample_rate = decoder.sample_rate().max(1);
        let channels = decoder.channels().max(1);

        let length = decoder
            .total_duration()
            .or_else(|| probe_duration(&url))
            .or_else(|| source.duration_hint())
            .ok_or_else(|| PlaybackError::decode(&url, "stream length is unknown"))?;
        let total_frames = (length.as_secs_f64() * sample_rate as f64).round() as u64;

        self.output.start()?;

        let id = self.mint_session();
        let clock = RenderClock::new();
        let samples: BoxedSamples = Box::new(decoder.convert_samples::<f32>());
        let segment = self.build_segment(samples, id, clock.clone());
        self.output.schedule(segment)?;

        self.feed.set_sample_rate(sample_rate);
        let session = PlaybackSession {
            id,
            url,
            sample_rate,
            channels,
            total_frames,
            seek_base: 0,
            clock,
            segment_finished: false,
            _lease: lease,
        };

        self.status.set_time(0.0);
        self.status.set_duration(session.seconds_at(total_frames));
        self.status.set_url(Some(session.url.clone()));
        info!(
            session = %id,
            url = %session.url.display(),
            sample_rate,
            channels,
            duration = session.seconds_at(total_frames),
            "playback started"
        );
        self.session = Some(session);

        self.output.play();
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Pause without losing the session or seek position.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.sample_position();
        self.output.pause();
        self.set_state(PlaybackState::Paused);
        info!(at = self.status.current_time(), "paused");
    }

    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        self.output.play();
        self.set_state(PlaybackState::Playing);
        info!(at = self.status.current_time(), "resumed");
    }

    /// Jump to `seconds`, clamped into the track.
    ///
    /// Reschedules playback from the new frame under a fresh session id,
    /// so anything still in flight for the old run is ignored.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            debug!(seconds, state = ?self.state, "seek ignored");
            return Ok(());
        }
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };

        let frame = session.frame_at(seconds);
        let target = session.seconds_at(frame);
        let url = session.url.clone();
        let sample_rate = session.sample_rate;

        // The old segment keeps rendering until the new one is positioned.
        let samples = match open_at(&url, frame, sample_rate) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "seek failed; stopping");
                self.stop();
                return Err(e);
            }
        };

        let id = self.mint_session();
        let clock = RenderClock::new();
        let segment = self.build_segment(samples, id, clock.clone());
        if let Err(e) = self.output.schedule(segment) {
            warn!(error = %e, "seek failed; stopping");
            self.stop();
            return Err(e);
        }

        if let Some(session) = self.session.as_mut() {
            session.id = id;
            session.seek_base = frame;
            session.clock = clock;
            session.segment_finished = false;
        }
        if self.state == PlaybackState::Playing {
            self.output.play();
        }
        self.status.set_time(target);
        info!(session = %id, to = target, "seeked");
        Ok(())
    }

    /// Halt playback, release the file and close the output.
    pub fn stop(&mut self) {
        let had_session = self.session.is_some();
        self.teardown();
        self.output.shutdown();
        self.status.set_time(0.0);
        self.status.set_url(None);
        self.set_state(PlaybackState::Stopped);
        if had_session {
            info!("stopped");
        }
    }

    /// Sample the render clock and run completion detection.
    ///
    /// Completion fires only once both the decoder has reported the
    /// segment exhausted and the clock has reached the end of the track.
    pub fn tick(&mut self) -> Option<Completion> {
        while let Ok(id) = self.segment_rx.try_recv() {
            if let Err(e) = self.on_segment_finished(id) {
                trace!(session = %id, reason = %e, "dropped segment callback");
            }
        }

        if self.state != PlaybackState::Playing {
            return None;
        }
        let session = self.session.as_ref()?;

        let frame = session.current_frame();
        if self.output.is_playing() {
            self.status.set_time(session.seconds_at(frame));
        }

        // on_segment_finished trims the length to the rendered end, so
        // after the signal this guard always holds. It is not an
        // independent check on the decoder.
        let tolerance =
            session.sample_rate as u64 * self.config.completion_tolerance_ms / 1000;
        let at_end = frame + tolerance >= session.total_frames;

        if at_end && session.segment_finished && !self.completion_latched {
            return self.complete();
        }
        None
    }

    /// Record the decoder's end-of-segment signal for session `id`.
    pub fn on_segment_finished(&mut self, id: SessionId) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .filter(|s| s.id == id)
            .ok_or(PlaybackError::SessionStale)?;

        session.segment_finished = true;
        let rendered_end = session.seek_base + session.clock.frames();
        if rendered_end < session.total_frames {
            // The decoder is the authority on length.
            debug!(
                expected = session.total_frames,
                actual = rendered_end,
                "stream ended early; trimming length"
            );
            session.total_frames = rendered_end;
            let duration = session.seconds_at(rendered_end);
            self.status.set_duration(duration);
        }
        Ok(())
    }

    /// Sender the render thread uses to report exhausted segments.
    pub fn segment_notifier(&self) -> Sender<SessionId> {
        self.segment_tx.clone()
    }

    /// Close the output for good.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.output.shutdown();
        self.set_state(PlaybackState::Stopped);
    }

    fn complete(&mut self) -> Option<Completion> {
        self.completion_latched = true;
        self.set_state(PlaybackState::Completing);

        let session = self.session.take()?;
        self.output.stop();
        self.status.set_time(session.seconds_at(session.total_frames));

        let completion = Completion {
            session: session.id,
            url: session.url.clone(),
        };
        info!(session = %session.id, url = %session.url.display(), "track completed");
        drop(session);

        if self.completions.send(completion.clone()).is_err() {
            debug!("no completion listener");
        }
        self.set_state(PlaybackState::Idle);
        Some(completion)
    }

    fn mint_session(&mut self) -> SessionId {
        self.last_id = self.last_id.next();
        self.completion_latched = false;
        self.status.set_session(self.last_id);
        debug!(session = %self.last_id, "minted session");
        self.last_id
    }

    fn build_segment(
        &self,
        samples: BoxedSamples,
        id: SessionId,
        clock: Arc<RenderClock>,
    ) -> Segment {
        SampleCapture::new(samples, self.producer.clone(), clock, id, self.segment_tx.clone())
    }

    fn sample_position(&self) {
        if let Some(session) = &self.session {
            if self.output.is_playing() {
                self.status.set_time(session.seconds_at(session.current_frame()));
            }
        }
    }

    /// Stop the node and drop the session (releasing its access lease).
    fn teardown(&mut self) {
        self.output.stop();
        if let Some(session) = self.session.take() {
            debug!(session = %session.id, "session torn down");
        }
        while self.segment_rx.try_recv().is_ok() {}
        self.status.set_url(None);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, "state change");
        }
        self.state = state;
        self.status.set_state(state);
    }
}

fn open_decoder(url: &Path) -> Result<FileDecoder> {
    let file = File::open(url).map_err(|e| PlaybackError::decode(url, e))?;
    Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::decode(url, e))
}

/// Open `url` positioned at `frame`.
///
/// Seeks in the container when the format allows it; only formats that
/// cannot seek fall back to decoding and discarding up to the target.
fn open_at(url: &Path, frame: u64, sample_rate: u32) -> Result<BoxedSamples> {
    let mut decoder = open_decoder(url)?;
    if frame == 0 {
        return Ok(Box::new(decoder.convert_samples::<f32>()));
    }

    let offset = frames_to_duration(frame, sample_rate);
    match decoder.try_seek(offset) {
        Ok(()) => Ok(Box::new(decoder.convert_samples::<f32>())),
        Err(SeekError::NotSupported { underlying_source }) => {
            debug!(source = underlying_source, "container cannot seek; skipping samples");
            Ok(Box::new(decoder.convert_samples::<f32>().skip_duration(offset)))
        }
        Err(e) => Err(PlaybackError::decode(url, e)),
    }
}

/// Commands sent to the playback thread.
enum Command {
    Play(Arc<dyn AudioSource>),
    Pause,
    Resume,
    Stop,
    Seek(f64),
}

struct Request {
    command: Command,
    reply: SyncSender<Result<()>>,
}

/// Thread-safe handle to one playback engine.
///
/// Owns a controller thread and an analysis thread; both stop when the
/// handle is dropped.
pub struct Engine {
    cmd_tx: Option<Sender<Request>>,
    status: Arc<PlaybackStatus>,
    feed: Arc<SpectrumFeed>,
    completions: Receiver<Completion>,
    worker: Option<JoinHandle<()>>,
    _analysis: AnalysisWorker,
}

impl Engine {
    /// Engine on the default output device with plain filesystem access.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_output(config, RodioOutput::new, Box::new(FilesystemAccess))
    }

    /// Engine whose output is built on the playback thread by `make_output`.
    ///
    /// Fails with [`PlaybackError::InvalidConfig`] before spawning anything
    /// if `config` does not validate.
    pub fn with_output<O, F>(
        config: EngineConfig,
        make_output: F,
        access: Box<dyn AccessPolicy>,
    ) -> Result<Self>
    where
        O: AudioOutput + 'static,
        F: FnOnce() -> O + Send + 'static,
    {
        config.validate()?;

        let (producer, consumer) = HeapRb::<f32>::new(config.analysis.capture_capacity).split();
        let producer: CaptureProducer = Arc::new(Mutex::new(producer));
        let feed = SpectrumFeed::new(config.analysis.bar_count);
        let analysis = AnalysisWorker::spawn(&config, consumer, feed.clone());

        let (cmd_tx, cmd_rx) = mpsc::channel::<Request>();
        let (completion_tx, completions) = mpsc::channel();
        let (status_tx, status_rx) = mpsc::sync_channel(1);
        let thread_feed = feed.clone();

        let worker = thread::Builder::new()
            .name("vizplay-playback".into())
            .spawn(move || {
                let poll = config.playback.position_poll_interval();
                let mut controller = PlaybackController::new(
                    &config,
                    make_output(),
                    access,
                    producer,
                    thread_feed,
                    completion_tx,
                );
                let _ = status_tx.send(controller.status());
                run_commands(&mut controller, &cmd_rx, poll);
                controller.shutdown();
            })
            .map_err(|e| PlaybackError::EngineStartFailed(e.to_string()))?;

        let status = status_rx
            .recv()
            .map_err(|_| PlaybackError::EngineStartFailed("playback thread exited".into()))?;

        Ok(Self {
            cmd_tx: Some(cmd_tx),
            status,
            feed,
            completions,
            worker: Some(worker),
            _analysis: analysis,
        })
    }

    fn request(&self, command: Command) -> Result<()> {
        let tx = self.cmd_tx.as_ref().ok_or(PlaybackError::Disconnected)?;
        let (reply, response) = mpsc::sync_channel(1);
        tx.send(Request { command, reply })
            .map_err(|_| PlaybackError::Disconnected)?;
        response.recv().map_err(|_| PlaybackError::Disconnected)?
    }

    /// Stop anything current and start `source`. Audio begins asynchronously.
    pub fn play(&self, source: Arc<dyn AudioSource>) -> Result<()> {
        self.request(Command::Play(source))
    }

    pub fn pause(&self) -> Result<()> {
        self.request(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.request(Command::Resume)
    }

    pub fn stop(&self) -> Result<()> {
        self.request(Command::Stop)
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.request(Command::Seek(seconds))
    }

    pub fn state(&self) -> PlaybackState {
        self.status.state()
    }

    pub fn is_playing(&self) -> bool {
        self.status.is_playing()
    }

    pub fn current_time(&self) -> f64 {
        self.status.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.status.duration()
    }

    pub fn current_url(&self) -> Option<PathBuf> {
        self.status.url()
    }

    /// Id of the most recently started play or seek.
    pub fn session(&self) -> SessionId {
        self.status.session()
    }

    /// Displayed bar levels in `[0, 1]`.
    pub fn bars(&self) -> Vec<f32> {
        self.feed.bars()
    }

    pub fn peaks(&self) -> Vec<f32> {
        self.feed.peaks()
    }

    pub fn gain(&self) -> f32 {
        self.feed.gain()
    }

    /// Completion notifications, one per finished session.
    pub fn completions(&self) -> &Receiver<Completion> {
        &self.completions
    }

    pub fn try_completion(&self) -> Option<Completion> {
        self.completions.try_recv().ok()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Closing the channel ends the command loop.
        self.cmd_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_commands<O: AudioOutput>(
    controller: &mut PlaybackController<O>,
    commands: &Receiver<Request>,
    poll: std::time::Duration,
) {
    loop {
        match commands.recv_timeout(poll) {
            Ok(Request { command, reply }) => {
                let result = match command {
                    Command::Play(source) => controller.play(source.as_ref()),
                    Command::Pause => {
                        controller.pause();
                        Ok(())
                    }
                    Command::Resume => {
                        controller.resume();
                        Ok(())
                    }
                    Command::Stop => {
                        controller.stop();
                        Ok(())
                    }
                    Command::Seek(seconds) => controller.seek(seconds),
                };
                let _ = reply.send(result);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        controller.tick();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;
    use std::time::Duration;

    use ringbuf::HeapCons;

    use super::*;
    use crate::audio::access::testing::CountingAccess;
    use crate::audio::output::testing::ManualOutput;
    use crate::audio::source::{FileAudioSource, LibraryItem};
    use crate::audio::test_support::{RAMP_PERIOD, write_ramp, write_tone};

    const RATE: u32 = 8_000;

    struct Harness {
        controller: PlaybackController<ManualOutput>,
        output: ManualOutput,
        access: CountingAccess,
        completions: Receiver<Completion>,
        consumer: HeapCons<f32>,
        _dir: tempfile::TempDir,
        track: FileAudioSource,
        other: FileAudioSource,
    }

    fn harness_with(output: ManualOutput) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let track = FileAudioSource::new(write_tone(dir.path(), "a.wav", 1.0, RATE));
        let other = FileAudioSource::new(write_tone(dir.path(), "b.wav", 0.5, RATE));

        let config = EngineConfig::default();
        let (producer, consumer) = HeapRb::<f32>::new(4096).split();
        let access = CountingAccess::default();
        let (tx, completions) = mpsc::channel();
        let controller = PlaybackController::new(
            &config,
            output.clone(),
            Box::new(access.clone()),
            Arc::new(Mutex::new(producer)),
            SpectrumFeed::new(config.analysis.bar_count),
            tx,
        );

        Harness {
            controller,
            output,
            access,
            completions,
            consumer,
            _dir: dir,
            track,
            other,
        }
    }

    fn harness() -> Harness {
        harness_with(ManualOutput::new())
    }

    #[test]
    fn play_loads_session_and_starts_output() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();

        assert_eq!(h.controller.state(), PlaybackState::Playing);
        let session = h.controller.session().unwrap();
        assert_eq!(session.sample_rate, RATE);
        assert_eq!(session.total_frames, RATE as u64);
        assert!((h.controller.duration() - 1.0).abs() < 1e-3);
        assert!(h.output.is_running_now());
        assert!(h.output.has_segment());
        assert_eq!(h.access.outstanding(), 1);
    }

    #[test]
    fn replaying_the_active_source_is_a_no_op() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        let id = h.controller.session().unwrap().id;
        h.output.render(100);

        h.controller.play(&h.track).unwrap();
        assert_eq!(h.controller.session().unwrap().id, id);
        assert_eq!(h.output.start_count(), 1);
    }

    #[test]
    fn position_follows_render_clock() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.output.render(2_000);
        h.controller.tick();
        assert!((h.controller.current_time() - 0.25).abs() < 1e-3);

        h.controller.seek(0.5).unwrap();
        h.output.render(800);
        h.controller.tick();
        assert!((h.controller.current_time() - 0.6).abs() < 1e-3);
    }

    #[test]
    fn paused_position_is_latched() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.output.render(1_600);
        h.controller.pause();
        assert_eq!(h.controller.state(), PlaybackState::Paused);
        let at = h.controller.current_time();
        assert!((at - 0.2).abs() < 1e-3);

        assert_eq!(h.output.render(1_000), 0);
        h.controller.tick();
        assert_eq!(h.controller.current_time(), at);

        h.controller.pause();
        assert_eq!(h.controller.state(), PlaybackState::Paused);
        h.controller.resume();
        h.controller.resume();
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert_eq!(h.controller.session().unwrap().seek_base, 0);
    }

    #[test]
    fn seek_clamps_into_track() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();

        h.controller.seek(-5.0).unwrap();
        assert_eq!(h.controller.session().unwrap().seek_base, 0);
        assert_eq!(h.controller.current_time(), 0.0);

        h.controller.seek(1.0 + 100.0).unwrap();
        let session = h.controller.session().unwrap();
        assert_eq!(session.seek_base, session.total_frames);
        assert!((h.controller.current_time() - 1.0).abs() < 1e-3);

        h.controller.seek(f64::NAN).unwrap();
        assert_eq!(h.controller.session().unwrap().seek_base, 0);
    }

    #[test]
    fn seek_lands_on_target_frame_in_long_track() {
        let mut h = harness();
        let path = write_ramp(h._dir.path(), "ramp.wav", 10 * RATE as usize, RATE);
        h.controller.play(&FileAudioSource::new(path)).unwrap();

        h.controller.seek(9.0).unwrap();
        let target = 9 * RATE as u64;
        assert_eq!(h.controller.session().unwrap().seek_base, target);
        assert!((h.controller.current_time() - 9.0).abs() < 1e-6);

        assert_eq!(h.output.render(512), 512);
        let mut captured = [0.0f32; 512];
        assert_eq!(h.consumer.pop_slice(&mut captured), 512);
        for (offset, &sample) in captured.iter().enumerate().step_by(97) {
            let expected = (target as usize + offset) % RAMP_PERIOD;
            let decoded = (sample * 32_768.0).round() as i64;
            assert!(
                (decoded - expected as i64).abs() <= 1,
                "frame {offset}: got {decoded}, want {expected}"
            );
        }

        h.controller.tick();
        assert!((h.controller.current_time() - (9.0 + 512.0 / RATE as f64)).abs() < 1e-6);
    }

    #[test]
    fn seek_while_paused_stays_paused() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.controller.pause();
        h.controller.seek(0.5).unwrap();
        assert_eq!(h.controller.state(), PlaybackState::Paused);
        assert_eq!(h.output.render(10), 0);
        h.controller.resume();
        assert_eq!(h.output.render(10), 10);
    }

    #[test]
    fn completion_fires_exactly_once() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        let id = h.controller.session().unwrap().id;
        h.output.render_to_end();

        // Extra push signals for the same session in the same tick.
        let notifier = h.controller.segment_notifier();
        notifier.send(id).unwrap();
        notifier.send(id).unwrap();

        let done = h.controller.tick().expect("completion");
        assert_eq!(done.session, id);
        assert!(h.controller.tick().is_none());
        assert!(h.controller.tick().is_none());

        assert_eq!(h.completions.try_iter().count(), 1);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!((h.controller.current_time() - 1.0).abs() < 1e-3);
        assert_eq!(h.access.outstanding(), 0);
    }

    #[test]
    fn early_end_of_stream_becomes_the_length() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        let id = h.controller.session().unwrap().id;
        h.output.render(100);

        h.controller.on_segment_finished(id).unwrap();
        assert_eq!(h.controller.session().unwrap().total_frames, 100);
        assert!((h.controller.duration() - 100.0 / RATE as f64).abs() < 1e-6);
        assert!(h.controller.tick().is_some());
        assert!(h.controller.tick().is_none());
    }

    #[test]
    fn clock_alone_does_not_complete() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.output.render(RATE as usize - 10);
        assert!(h.controller.tick().is_none());
        assert!(h.completions.try_recv().is_err());
    }

    #[test]
    fn seek_near_end_then_stop_never_completes() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.controller.seek(1.0 - 0.02).unwrap();
        h.output.render_to_end();
        h.controller.stop();

        assert!(h.controller.tick().is_none());
        assert!(h.completions.try_recv().is_err());
        assert_eq!(h.controller.state(), PlaybackState::Stopped);
    }

    #[test]
    fn stale_segment_callbacks_are_dropped() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        let old = h.controller.session().unwrap().id;

        h.controller.seek(0.1).unwrap();
        assert!(matches!(
            h.controller.on_segment_finished(old),
            Err(PlaybackError::SessionStale)
        ));

        h.controller.play(&h.other).unwrap();
        h.controller.segment_notifier().send(old).unwrap();
        assert!(h.controller.tick().is_none());
        assert!(!h.controller.session().unwrap().segment_finished);
    }

    #[test]
    fn seeking_to_the_end_completes() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.controller.seek(5.0).unwrap();
        h.output.render_to_end();
        assert!(h.controller.tick().is_some());
    }

    #[test]
    fn stop_releases_everything() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.output.render(500);
        h.controller.stop();

        assert_eq!(h.controller.state(), PlaybackState::Stopped);
        assert!(h.controller.state().is_idle());
        assert_eq!(h.controller.current_time(), 0.0);
        assert_eq!(h.access.outstanding(), 0);
        assert!(!h.output.has_segment());
        assert!(!h.output.is_running_now());

        // The graph is started again on the next play.
        h.controller.play(&h.track).unwrap();
        assert_eq!(h.output.start_count(), 2);
    }

    #[test]
    fn invalid_source_leaves_state_untouched() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        let item = LibraryItem {
            persistent_id: 7,
            ..Default::default()
        };

        let err = h.controller.play(&item).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidSource));
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert_eq!(h.access.outstanding(), 1);
    }

    #[test]
    fn access_denied_cleans_up() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.access.deny.store(true, AtomicOrdering::SeqCst);

        let err = h.controller.play(&h.other).unwrap_err();
        assert!(matches!(err, PlaybackError::AccessDenied { .. }));
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.access.outstanding(), 0);
        assert!(!h.output.has_segment());
    }

    #[test]
    fn undecodable_file_releases_access() {
        let mut h = harness();
        let bogus = h._dir.path().join("bogus.mp3");
        std::fs::write(&bogus, b"definitely not audio").unwrap();

        let err = h.controller.play(&FileAudioSource::new(&bogus)).unwrap_err();
        assert!(matches!(err, PlaybackError::DecodeFailed { .. }));
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.access.outstanding(), 0);
    }

    #[test]
    fn missing_file_is_a_decode_failure() {
        let mut h = harness();
        let err = h
            .controller
            .play(&FileAudioSource::new("/no/such/dir/track.wav"))
            .unwrap_err();
        assert!(matches!(err, PlaybackError::DecodeFailed { .. }));
    }

    #[test]
    fn engine_start_failure_leaves_no_lease() {
        let mut h = harness_with(ManualOutput::failing());
        let err = h.controller.play(&h.track).unwrap_err();
        assert!(matches!(err, PlaybackError::EngineStartFailed(_)));
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.access.outstanding(), 0);
        assert!(h.controller.session().is_none());
    }

    #[test]
    fn capture_feeds_the_ring() {
        let mut h = harness();
        h.controller.play(&h.track).unwrap();
        h.output.render(1_024);
        assert!(h.consumer.occupied_len() >= 1_024);
    }

    #[test]
    fn engine_rejects_unusable_config() {
        let mut config = EngineConfig::default();
        config.analysis.fft_size = 0;
        let result = Engine::with_output(config, ManualOutput::new, Box::new(CountingAccess::default()));
        assert!(matches!(result, Err(PlaybackError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.analysis.capture_capacity = 0;
        let result = Engine::with_output(config, ManualOutput::new, Box::new(CountingAccess::default()));
        assert!(matches!(result, Err(PlaybackError::InvalidConfig(_))));
    }

    #[test]
    fn engine_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let track: Arc<dyn AudioSource> =
            Arc::new(FileAudioSource::new(write_tone(dir.path(), "t.wav", 0.25, RATE)));
        let output = ManualOutput::new();
        let handle = output.clone();
        let engine = Engine::with_output(
            EngineConfig::default(),
            move || handle,
            Box::new(CountingAccess::default()),
        )
        .unwrap();

        engine.play(track).unwrap();
        assert!(engine.is_playing());
        assert!((engine.duration() - 0.25).abs() < 1e-3);

        output.render_to_end();
        let done = engine
            .completions()
            .recv_timeout(Duration::from_secs(5))
            .expect("completion");
        assert_eq!(done.url, dir.path().join("t.wav"));
        assert!(!engine.is_playing());

        let missing: Arc<dyn AudioSource> = Arc::new(LibraryItem::default());
        assert!(matches!(engine.play(missing), Err(PlaybackError::InvalidSource)));
        engine.stop().unwrap();
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }
}
