// src/app/state.rs
//! Application state management.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::KeyEvent;
use ratatui::{Frame, widgets::ListState};
use tracing::{debug, info, warn};

use super::now_playing::{NowPlayingSink, NowPlayingSnapshot, RemoteCommand};
use super::playlist::PlaylistCursor;
use crate::{
    audio::{AudioSource, Completion, Engine, PlaybackState},
    config::PlaybackConfig,
    error::Result,
    ui::{
        keybindings::{Action, key_to_action},
        layout::{SectionVisibility, compute_layout},
        widgets::{render_player_panel, render_playlist, render_spectrum},
    },
};

/// Seconds moved by a single seek key press.
const SEEK_STEP_SECS: f64 = 5.0;

/// Main application state.
pub struct App {
    /// Playback engine
    engine: Engine,
    /// Tracks and the current position
    playlist: PlaylistCursor,
    /// External now-playing display
    sink: Box<dyn NowPlayingSink>,
    config: PlaybackConfig,

    /// When to start the next track after a completion
    pending_advance: Option<Instant>,
    last_now_playing: Instant,

    /// Last transport error, shown in the player panel
    pub status_line: Option<String>,
    /// List widget state
    pub list_state: ListState,
    /// Section visibility state
    pub visibility: SectionVisibility,
}

impl App {
    pub fn new(engine: Engine, config: &PlaybackConfig, sink: Box<dyn NowPlayingSink>) -> Self {
        Self {
            engine,
            playlist: PlaylistCursor::new(),
            sink,
            config: config.clone(),
            pending_advance: None,
            last_now_playing: Instant::now(),
            status_line: None,
            list_state: ListState::default(),
            visibility: SectionVisibility::default(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn playlist(&self) -> &PlaylistCursor {
        &self.playlist
    }

    pub fn pending_advance(&self) -> Option<Instant> {
        self.pending_advance
    }

    pub fn set_playlist(&mut self, items: Vec<Arc<dyn AudioSource>>, start: usize) {
        self.playlist.set_playlist(items, start);
        self.list_state.select(self.playlist.index());
    }

    /// Stop playback and forget every track.
    pub fn clear_playlist(&mut self) -> Result<()> {
        self.stop()?;
        self.playlist.clear();
        self.list_state.select(None);
        self.sink.clear();
        Ok(())
    }

    /// Play the playlist's current track from the start.
    pub fn play_current(&mut self) -> Result<()> {
        self.pending_advance = None;
        let Some(source) = self.playlist.current_source() else {
            debug!("nothing to play");
            return Ok(());
        };
        self.list_state.select(self.playlist.index());
        self.engine.play(source)?;
        self.status_line = None;
        self.push_now_playing();
        Ok(())
    }

    /// Pause when playing, resume a part-played track, or start the current one.
    pub fn toggle_play_pause(&mut self) -> Result<()> {
        self.pending_advance = None;
        if self.engine.is_playing() {
            self.engine.pause()?;
            self.push_now_playing();
            return Ok(());
        }

        let t = self.engine.current_time();
        if self.engine.state() == PlaybackState::Paused && t > 0.0 && t < self.engine.duration() {
            self.engine.resume()?;
            self.push_now_playing();
            Ok(())
        } else {
            self.play_current()
        }
    }

    /// Restart the track, or go to the previous one near its start.
    pub fn skip_backward(&mut self) -> Result<()> {
        self.pending_advance = None;
        if self.engine.current_time() >= self.config.restart_threshold_secs {
            return self.engine.seek(0.0);
        }
        if self.playlist.has_previous() {
            self.engine.stop()?;
            self.playlist.move_to_previous();
            return self.play_current();
        }
        self.engine.seek(0.0)
    }

    pub fn skip_forward(&mut self) -> Result<()> {
        if !self.playlist.has_next() {
            return Ok(());
        }
        self.pending_advance = None;
        self.engine.stop()?;
        self.playlist.move_to_next();
        self.play_current()
    }

    pub fn seek_to(&mut self, seconds: f64) -> Result<()> {
        self.engine.seek(seconds)?;
        self.push_now_playing();
        Ok(())
    }

    pub fn seek_by(&mut self, delta: f64) -> Result<()> {
        self.seek_to(self.engine.current_time() + delta)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.pending_advance = None;
        self.engine.stop()?;
        self.push_now_playing();
        Ok(())
    }

    /// Route an intent from a remote control surface.
    pub fn handle_remote(&mut self, command: RemoteCommand) -> Result<()> {
        debug!(?command, "remote command");
        match command {
            RemoteCommand::TogglePlayPause => self.toggle_play_pause(),
            RemoteCommand::Next => self.skip_forward(),
            RemoteCommand::Previous => self.skip_backward(),
            RemoteCommand::SeekTo(seconds) => self.seek_to(seconds),
        }
    }

    /// Stop and either schedule the next track or rewind the playlist.
    pub fn on_completion(&mut self, completion: Completion, now: Instant) -> Result<()> {
        if completion.session != self.engine.session() {
            debug!(session = %completion.session, "ignoring completion of a replaced session");
            return Ok(());
        }
        self.engine.stop()?;

        if self.playlist.has_next() {
            self.pending_advance = Some(now + self.config.advance_delay());
        } else {
            info!("end of playlist");
            self.playlist.move_to_index(0);
            self.list_state.select(self.playlist.index());
        }
        self.push_now_playing();
        Ok(())
    }

    /// Drive timers: completions, the delayed advance and now-playing refresh.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        while let Some(completion) = self.engine.try_completion() {
            self.on_completion(completion, now)?;
        }

        if self.pending_advance.is_some_and(|due| now >= due) {
            self.pending_advance = None;
            if self.playlist.move_to_next() {
                self.play_current()?;
            }
        }

        if now.saturating_duration_since(self.last_now_playing) >= self.config.now_playing_interval() {
            self.push_now_playing();
            self.last_now_playing = now;
        }
        Ok(())
    }

    /// Push the current snapshot to the sink.
    pub fn push_now_playing(&mut self) {
        match self.now_playing() {
            Some(snapshot) => self.sink.update(&snapshot),
            None => self.sink.clear(),
        }
    }

    pub fn now_playing(&self) -> Option<NowPlayingSnapshot> {
        let source = self.playlist.current_source()?;
        Some(NowPlayingSnapshot::from_source(
            source.as_ref(),
            self.engine.duration(),
            self.engine.current_time(),
            self.engine.is_playing(),
        ))
    }

    /// Handle a key event and return true if the app should quit.
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        let result = match key_to_action(&key) {
            Action::TogglePlayPause => self.toggle_play_pause(),
            Action::Next => self.skip_forward(),
            Action::Previous => self.skip_backward(),
            Action::SeekBackward => self.seek_by(-SEEK_STEP_SECS),
            Action::SeekForward => self.seek_by(SEEK_STEP_SECS),
            Action::Stop => self.stop(),
            Action::ToggleSection(d) => {
                self.visibility.toggle(d);
                Ok(())
            }
            Action::Quit => {
                if let Err(e) = self.engine.stop() {
                    warn!(error = %e, "stop on quit failed");
                }
                return true;
            }
            Action::None => Ok(()),
        };

        if let Err(e) = result {
            warn!(error = %e, "transport action failed");
            self.status_line = Some(e.to_string());
        }
        false
    }

    /// Draw the application UI.
    pub fn draw(&mut self, f: &mut Frame<'_>) {
        let layout = compute_layout(f.area(), &self.visibility);

        if let Some(area) = layout.playlist_area {
            render_playlist(f, area, &self.playlist, &mut self.list_state);
        }
        if let Some(area) = layout.player_area {
            render_player_panel(
                f,
                area,
                self.now_playing().as_ref(),
                self.engine.current_time(),
                self.engine.duration(),
                self.engine.state(),
                self.status_line.as_deref(),
            );
        }
        if let Some(area) = layout.visualizer_area {
            render_spectrum(f, area, &self.engine.bars(), &self.engine.peaks(), self.engine.gain());
        }
    }

    /// Time until the delayed advance is due, if one is pending.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.pending_advance
            .map(|due| due.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::thread;

    use super::*;
    use crate::app::now_playing::testing::RecordingNowPlaying;
    use crate::audio::FileAudioSource;
    use crate::audio::access::testing::CountingAccess;
    use crate::audio::output::testing::ManualOutput;
    use crate::audio::test_support::write_tone;
    use crate::config::EngineConfig;

    const RATE: u32 = 8_000;

    struct Fixture {
        app: App,
        output: ManualOutput,
        sink: RecordingNowPlaying,
        paths: Vec<PathBuf>,
        _dir: tempfile::TempDir,
    }

    fn fixture(lengths: &[f64]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = lengths
            .iter()
            .enumerate()
            .map(|(i, &secs)| write_tone(dir.path(), &format!("{i}.wav"), secs, RATE))
            .collect();

        let config = EngineConfig::default();
        let output = ManualOutput::new();
        let handle = output.clone();
        let engine = Engine::with_output(
            config.clone(),
            move || handle,
            Box::new(CountingAccess::default()),
        )
        .unwrap();

        let sink = RecordingNowPlaying::new();
        let mut app = App::new(engine, &config.playback, Box::new(sink.clone()));
        let items = paths
            .iter()
            .map(|p| Arc::new(FileAudioSource::new(p)) as Arc<dyn AudioSource>)
            .collect();
        app.set_playlist(items, 0);

        Fixture {
            app,
            output,
            sink,
            paths,
            _dir: dir,
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not met in time");
    }

    #[test]
    fn toggle_plays_pauses_and_resumes() {
        let mut fx = fixture(&[1.0]);
        fx.app.toggle_play_pause().unwrap();
        assert!(fx.app.engine().is_playing());
        assert_eq!(fx.app.engine().current_url(), Some(fx.paths[0].clone()));

        fx.output.render(2_000);
        wait_until(|| fx.app.engine().current_time() > 0.2);

        fx.app.toggle_play_pause().unwrap();
        assert_eq!(fx.app.engine().state(), PlaybackState::Paused);

        fx.app.toggle_play_pause().unwrap();
        assert!(fx.app.engine().is_playing());
        assert!(fx.app.engine().current_time() > 0.2);
    }

    #[test]
    fn toggle_after_stop_restarts_current() {
        let mut fx = fixture(&[1.0]);
        fx.app.play_current().unwrap();
        fx.app.stop().unwrap();
        assert_eq!(fx.app.engine().state(), PlaybackState::Stopped);

        fx.app.toggle_play_pause().unwrap();
        assert!(fx.app.engine().is_playing());
        assert_eq!(fx.app.engine().current_time(), 0.0);
    }

    #[test]
    fn skip_backward_restarts_late_in_track() {
        let mut fx = fixture(&[1.0, 4.0]);
        fx.app.skip_forward().unwrap();
        assert_eq!(fx.app.playlist().index(), Some(1));

        fx.output.render(3 * RATE as usize + 800);
        wait_until(|| fx.app.engine().current_time() >= 3.0);

        fx.app.skip_backward().unwrap();
        assert_eq!(fx.app.playlist().index(), Some(1));
        assert_eq!(fx.app.engine().current_time(), 0.0);
    }

    #[test]
    fn skip_backward_early_goes_to_previous() {
        let mut fx = fixture(&[1.0, 1.0]);
        fx.app.skip_forward().unwrap();
        fx.app.skip_backward().unwrap();
        assert_eq!(fx.app.playlist().index(), Some(0));
        assert_eq!(fx.app.engine().current_url(), Some(fx.paths[0].clone()));

        // At the first track it just rewinds.
        fx.app.skip_backward().unwrap();
        assert_eq!(fx.app.playlist().index(), Some(0));
        assert!(fx.app.engine().is_playing());
    }

    #[test]
    fn skip_forward_at_end_is_a_no_op() {
        let mut fx = fixture(&[1.0]);
        fx.app.play_current().unwrap();
        fx.app.skip_forward().unwrap();
        assert_eq!(fx.app.playlist().index(), Some(0));
        assert!(fx.app.engine().is_playing());
    }

    #[test]
    fn completion_advances_after_delay() {
        let mut fx = fixture(&[0.25, 0.25]);
        fx.app.play_current().unwrap();
        fx.output.render_to_end();

        wait_until(|| {
            fx.app.tick(Instant::now()).unwrap();
            fx.app.pending_advance().is_some()
        });
        assert!(!fx.app.engine().is_playing());
        assert_eq!(fx.app.playlist().index(), Some(0));

        let due = fx.app.pending_advance().unwrap();
        fx.app.tick(due - Duration::from_millis(1)).unwrap();
        assert_eq!(fx.app.playlist().index(), Some(0));

        fx.app.tick(due).unwrap();
        assert_eq!(fx.app.playlist().index(), Some(1));
        assert!(fx.app.engine().is_playing());
        assert_eq!(fx.app.engine().current_url(), Some(fx.paths[1].clone()));
    }

    #[test]
    fn completion_of_last_track_rewinds_playlist() {
        let mut fx = fixture(&[0.25, 0.25]);
        fx.app.skip_forward().unwrap();
        fx.output.render_to_end();

        wait_until(|| {
            fx.app.tick(Instant::now()).unwrap();
            fx.app.playlist().index() == Some(0)
        });
        assert!(fx.app.pending_advance().is_none());
        assert_eq!(fx.app.engine().state(), PlaybackState::Stopped);
    }

    #[test]
    fn user_action_cancels_pending_advance() {
        let mut fx = fixture(&[0.25, 0.25]);
        fx.app.play_current().unwrap();
        fx.output.render_to_end();
        wait_until(|| {
            fx.app.tick(Instant::now()).unwrap();
            fx.app.pending_advance().is_some()
        });

        fx.app.stop().unwrap();
        fx.app.tick(Instant::now() + Duration::from_secs(1)).unwrap();
        assert_eq!(fx.app.playlist().index(), Some(0));
        assert!(!fx.app.engine().is_playing());
    }

    #[test]
    fn remote_commands_route_to_transport() {
        let mut fx = fixture(&[1.0, 1.0]);
        fx.app.handle_remote(RemoteCommand::TogglePlayPause).unwrap();
        assert!(fx.app.engine().is_playing());

        fx.app.handle_remote(RemoteCommand::SeekTo(0.5)).unwrap();
        assert!((fx.app.engine().current_time() - 0.5).abs() < 1e-3);

        fx.app.handle_remote(RemoteCommand::Next).unwrap();
        assert_eq!(fx.app.playlist().index(), Some(1));

        fx.app.handle_remote(RemoteCommand::Previous).unwrap();
        assert_eq!(fx.app.playlist().index(), Some(0));
    }

    #[test]
    fn now_playing_is_pushed_on_play_and_on_timer() {
        let mut fx = fixture(&[1.0]);
        fx.app.play_current().unwrap();
        let first = fx.sink.last().unwrap();
        assert_eq!(first.title, "0");
        assert_eq!(first.artist, "Unknown");
        assert!(first.is_playing);

        let before = fx.sink.history().len();
        fx.app.tick(Instant::now() + Duration::from_millis(1_100)).unwrap();
        assert_eq!(fx.sink.history().len(), before + 1);
    }

    #[test]
    fn clearing_the_playlist_clears_the_sink() {
        let mut fx = fixture(&[1.0]);
        fx.app.play_current().unwrap();
        fx.app.clear_playlist().unwrap();
        assert!(fx.app.playlist().is_empty());
        assert_eq!(fx.sink.history().last(), Some(&None));

        fx.app.toggle_play_pause().unwrap();
        assert!(!fx.app.engine().is_playing());
    }
}
