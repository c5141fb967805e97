// src/audio/visualizer/fft.rs
//! Windowed FFT, A-weighting and per-bin smoothing.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::config::AnalysisConfig;

/// Floor added to linear magnitudes before taking the logarithm.
const MAGNITUDE_EPSILON: f32 = 1e-10;
/// Bins at or below this frequency skip the A-weighting formula.
const A_WEIGHT_CUTOFF_HZ: f32 = 10.0;
const A_WEIGHT_SUBSONIC_DB: f32 = -50.0;

/// Converts fixed-size blocks of mono samples into a smoothed,
/// perceptually weighted magnitude spectrum in `[0, 1]`.
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Smoothed output, `fft_size / 2` bins.
    levels: Vec<f32>,
    /// A-weighting in dB per bin, cached for `weights_rate`.
    weights: Vec<f32>,
    weights_rate: u32,
    db_floor: f32,
    db_range: f32,
    smoothing: f32,
}

impl FftProcessor {
    /// Create a processor for `config.fft_size`, which must be a power of two.
    pub fn new(config: &AnalysisConfig) -> Self {
        let fft_size = config.fft_size;
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window = (0..fft_size).map(|i| hann(i, fft_size)).collect();

        Self {
            fft,
            fft_size,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            levels: vec![0.0; fft_size / 2],
            weights: vec![0.0; fft_size / 2],
            weights_rate: 0,
            db_floor: config.db_floor,
            db_range: config.db_ceiling - config.db_floor,
            smoothing: config.bin_smoothing,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }


    /// Zero the smoothing history.
    pub fn reset(&mut self) {
        self.levels.fill(0.0);
    }

    /// Analyze one block and return the updated spectrum.
    ///
    /// Blocks shorter than the FFT length are zero-padded; longer blocks
    /// only contribute their first `fft_size` samples.
    pub fn analyze(&mut self, samples: &[f32], sample_rate: u32) -> &[f32] {
        if sample_rate != self.weights_rate {
            self.rebuild_weights(sample_rate);
        }

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            let sample = if sample.is_finite() { sample } else { 0.0 };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 2.0 / self.fft_size as f32;
        let retain = self.smoothing;
        for (i, level) in self.levels.iter_mut().enumerate() {
            let magnitude = self.buffer[i].norm() * scale;
            let db = 20.0 * (magnitude + MAGNITUDE_EPSILON).log10() + self.weights[i];
            let mut normalized = ((db - self.db_floor) / self.db_range).clamp(0.0, 1.0);
            if !normalized.is_finite() {
                normalized = 0.0;
            }

            let smoothed = *level * retain + normalized * (1.0 - retain);
            *level = if smoothed.is_finite() { smoothed } else { 0.0 };
        }

        &self.levels
    }

    fn rebuild_weights(&mut self, sample_rate: u32) {
        let bin_hz = sample_rate as f32 / self.fft_size as f32;
        for (i, weight) in self.weights.iter_mut().enumerate() {
            *weight = a_weighting_db(i as f32 * bin_hz);
        }
        self.weights_rate = sample_rate;
    }
}

/// Hann window value for index `i` of a window of length `len`.
fn hann(i: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (len - 1) as f32).cos()
}

/// IEC 61672 A-weighting curve in dB, normalized to roughly 0 dB at 1 kHz.
pub fn a_weighting_db(frequency: f32) -> f32 {
    if frequency <= A_WEIGHT_CUTOFF_HZ {
        return A_WEIGHT_SUBSONIC_DB;
    }

    // Evaluated in f64: f^4 * 12194^2 overflows f32 precision near Nyquist.
    let f2 = (frequency as f64).powi(2);
    let c1 = 12194.217_f64.powi(2);
    let c2 = 20.598_997_f64.powi(2);
    let c3 = 107.652_65_f64.powi(2);
    let c4 = 737.862_23_f64.powi(2);

    let numerator = c1 * f2 * f2;
    let denominator = (f2 + c2) * ((f2 + c3) * (f2 + c4)).sqrt() * (f2 + c1);
    if denominator <= 0.0 {
        return A_WEIGHT_SUBSONIC_DB;
    }

    (2.0 + 20.0 * (numerator / denominator).log10()) as f32
}
