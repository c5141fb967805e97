// src/audio/test_support.rs
//! Fixtures shared by tests across the crate.

use std::path::{Path, PathBuf};

/// Write a mono 16-bit 440 Hz tone of `seconds` to `dir/name`.
pub fn write_tone(dir: &Path, name: &str, seconds: f64, sample_rate: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let frames = (seconds * sample_rate as f64).round() as usize;
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let sample = (t * 440.0 * std::f64::consts::TAU).sin() * 0.4 * i16::MAX as f64;
        writer.write_sample(sample as i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Write a mono 16-bit file whose sample `i` is `i % RAMP_PERIOD`, so a
/// decoded value identifies the frame it came from.
pub fn write_ramp(dir: &Path, name: &str, frames: usize, sample_rate: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..frames {
        writer.write_sample((i % RAMP_PERIOD) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

pub const RAMP_PERIOD: usize = 30_000;
