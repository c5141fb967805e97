// src/audio/visualizer/envelope.rs
//! Attack/release smoothing, peak hold and automatic gain control.

use crate::config::EnvelopeConfig;

/// Averages below this are treated as silence and leave the gain at unity.
const SILENCE_LEVEL: f32 = 0.01;

/// Turns raw bar levels into the values shown on screen.
#[derive(Debug, Clone)]
pub struct EnvelopeController {
    config: EnvelopeConfig,
    displayed: Vec<f32>,
    peaks: Vec<f32>,
    /// Remaining hold ticks per band before its peak starts to fall.
    peak_countdown: Vec<u32>,
    gain_history: GainHistory,
    gain: f32,
}

impl EnvelopeController {
    pub fn new(bar_count: usize, config: &EnvelopeConfig) -> Self {
        Self {
            config: config.clone(),
            displayed: vec![0.0; bar_count],
            peaks: vec![0.0; bar_count],
            peak_countdown: vec![0; bar_count],
            gain_history: GainHistory::new(config.gain_history_len),
            gain: 1.0,
        }
    }

    pub fn displayed(&self) -> &[f32] {
        &self.displayed
    }

    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    /// Currently applied automatic gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Return every band, peak and the gain to their initial state.
    pub fn reset(&mut self) {
        self.displayed.fill(0.0);
        self.peaks.fill(0.0);
        self.peak_countdown.fill(0);
        self.gain_history.clear();
        self.gain = 1.0;
    }

    /// Advance one tick toward `raw` and return the displayed levels.
    ///
    /// Missing trailing bands are treated as silent; extra ones are ignored.
    pub fn update(&mut self, raw: &[f32]) -> &[f32] {
        let frame_max = raw
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f32, f32::max);
        self.update_gain(frame_max);

        for i in 0..self.displayed.len() {
            let target = sanitize(raw.get(i).copied().unwrap_or(0.0) * self.gain);
            self.step_band(i, target);
        }

        &self.displayed
    }

    /// Let every band fall toward zero without touching the gain.
    /// Used when the capture stream has gone quiet.
    pub fn decay(&mut self) -> &[f32] {
        for i in 0..self.displayed.len() {
            self.step_band(i, 0.0);
        }
        &self.displayed
    }

    fn step_band(&mut self, i: usize, target: f32) {
        let current = self.displayed[i];
        let rate = if target > current {
            self.config.attack
        } else {
            self.config.release
        };
        let next = sanitize(current + (target - current) * rate);
        self.displayed[i] = next;

        if next > self.peaks[i] {
            self.peaks[i] = next;
            self.peak_countdown[i] = self.config.peak_hold_ticks;
        } else if self.peak_countdown[i] > 0 {
            self.peak_countdown[i] -= 1;
        } else {
            self.peaks[i] = sanitize(self.peaks[i] * self.config.peak_decay);
        }
    }

    fn update_gain(&mut self, frame_max: f32) {
        self.gain_history.push(frame_max);
        let average = self.gain_history.average();

        let desired = if average > SILENCE_LEVEL {
            self.config.target_level / average
        } else {
            1.0
        }
        .clamp(self.config.min_gain, self.config.max_gain);

        let retain = self.config.gain_smoothing;
        self.gain = self.gain * retain + desired * (1.0 - retain);
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Fixed-length ring of recent per-tick maxima.
#[derive(Debug, Clone)]
struct GainHistory {
    values: Vec<f32>,
    capacity: usize,
    next: usize,
}

impl GainHistory {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    fn push(&mut self, value: f32) {
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            self.values[self.next] = value;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    fn average(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    fn clear(&mut self) {
        self.values.clear();
        self.next = 0;
    }
}
