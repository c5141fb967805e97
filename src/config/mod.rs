// src/config/mod.rs
//! Engine configuration: analysis, envelope and playback tuning.
//!
//! Every field has a built-in default, so an empty TOML document (or no
//! file at all) yields a working engine.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for one engine instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analysis: AnalysisConfig,
    pub envelope: EnvelopeConfig,
    pub playback: PlaybackConfig,
}

/// Frequency analysis and band layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// FFT length in samples; must be a power of two.
    pub fft_size: usize,
    pub bar_count: usize,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    /// Weighted level mapped to 0.0.
    pub db_floor: f32,
    /// Weighted level mapped to 1.0.
    pub db_ceiling: f32,
    /// Fraction of the previous bin value retained per analysis call.
    pub bin_smoothing: f32,
    /// Mono samples buffered between the render thread and the analysis worker.
    pub capture_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            bar_count: 32,
            min_frequency_hz: 60.0,
            max_frequency_hz: 16_000.0,
            db_floor: -60.0,
            db_ceiling: 20.0,
            bin_smoothing: 0.8,
            capture_capacity: 16_384,
        }
    }
}

/// Attack/release smoothing, peak hold and automatic gain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Fraction of the gap closed per tick when rising.
    pub attack: f32,
    /// Fraction of the gap closed per tick when falling.
    pub release: f32,
    pub peak_hold_ticks: u32,
    pub peak_decay: f32,
    pub gain_history_len: usize,
    pub target_level: f32,
    pub min_gain: f32,
    pub max_gain: f32,
    /// Fraction of the applied gain retained per tick.
    pub gain_smoothing: f32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack: 0.9,
            release: 0.4,
            peak_hold_ticks: 10,
            peak_decay: 0.95,
            gain_history_len: 30,
            target_level: 0.75,
            min_gain: 0.3,
            max_gain: 2.0,
            gain_smoothing: 0.95,
        }
    }
}

/// Transport timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Distance from the end of the track at which the poll guard confirms completion.
    pub completion_tolerance_ms: u64,
    /// Render-clock sampling cadence.
    pub position_poll_ms: u64,
    pub now_playing_interval_ms: u64,
    /// Skipping backward past this point restarts the current track instead.
    pub restart_threshold_secs: f64,
    /// Pause between a completed track and the start of the next one.
    pub advance_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            completion_tolerance_ms: 50,
            position_poll_ms: 16,
            now_playing_interval_ms: 1000,
            restart_threshold_secs: 3.0,
            advance_delay_ms: 100,
        }
    }
}

impl PlaybackConfig {
    pub fn position_poll_interval(&self) -> Duration {
        Duration::from_millis(self.position_poll_ms.max(1))
    }

    pub fn now_playing_interval(&self) -> Duration {
        Duration::from_millis(self.now_playing_interval_ms.max(1))
    }

    pub fn advance_delay(&self) -> Duration {
        Duration::from_millis(self.advance_delay_ms)
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the analysis pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.analysis;
        if a.fft_size < 64 || !a.fft_size.is_power_of_two() {
            return Err(invalid(format!(
                "fft_size must be a power of two >= 64, got {}",
                a.fft_size
            )));
        }
        if a.bar_count == 0 {
            return Err(invalid("bar_count must be at least 1"));
        }
        if !(a.min_frequency_hz > 0.0 && a.min_frequency_hz < a.max_frequency_hz) {
            return Err(invalid("frequency range must satisfy 0 < min < max"));
        }
        if a.db_floor >= a.db_ceiling {
            return Err(invalid("db_floor must be below db_ceiling"));
        }
        if a.capture_capacity < a.fft_size {
            return Err(invalid("capture_capacity must hold at least one FFT block"));
        }
        check_unit("bin_smoothing", a.bin_smoothing)?;

        let e = &self.envelope;
        check_unit("attack", e.attack)?;
        check_unit("release", e.release)?;
        check_unit("peak_decay", e.peak_decay)?;
        check_unit("gain_smoothing", e.gain_smoothing)?;
        if e.gain_history_len == 0 {
            return Err(invalid("gain_history_len must be at least 1"));
        }
        if !(e.min_gain > 0.0 && e.min_gain <= e.max_gain) {
            return Err(invalid("gain range must satisfy 0 < min_gain <= max_gain"));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must lie in [0, 1], got {value}")))
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
