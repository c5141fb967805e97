// src/audio/visualizer/mod.rs
//! Real-time audio spectrum visualizer using FFT analysis.
//!
//! Raw mono samples arrive from the render thread through a ring buffer.
//! A dedicated worker runs them through three stages and publishes the
//! result into a [`SpectrumFeed`] that the UI polls at its own rate:
//!
//! 1. [`FftProcessor`]: Hann window, FFT, A-weighting, dB normalization
//!    and per-bin smoothing.
//! 2. [`BandAggregator`]: log-spaced grouping into a few bars.
//! 3. [`EnvelopeController`]: attack/release, peak hold and automatic gain.

mod bands;
mod envelope;
mod fft;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ringbuf::{HeapCons, traits::*};
use tracing::{debug, trace};

use crate::config::EngineConfig;

pub use bands::{BandAggregator, BandLayout};
pub use envelope::EnvelopeController;
pub use fft::{FftProcessor, a_weighting_db};

/// How often the worker checks for new samples.
const POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Empty polls before the bars start to fall on their own.
const IDLE_POLLS_BEFORE_DECAY: u32 = 10;

/// The analysis pipeline, driven one block at a time.
pub struct Visualizer {
    fft: FftProcessor,
    bands: BandAggregator,
    envelope: EnvelopeController,
}

impl Visualizer {
    pub fn new(config: &EngineConfig) -> Self {
        let bands = BandAggregator::new(&config.analysis);
        let envelope = EnvelopeController::new(bands.bar_count(), &config.envelope);
        Self {
            fft: FftProcessor::new(&config.analysis),
            bands,
            envelope,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft.fft_size()
    }

    /// Run one block through every stage and return the displayed bars.
    pub fn process(&mut self, samples: &[f32], sample_rate: u32) -> &[f32] {
        let magnitudes = self.fft.analyze(samples, sample_rate);
        let raw = self.bands.aggregate(magnitudes, sample_rate);
        self.envelope.update(raw)
    }

    /// Let the bars fall when no audio is arriving.
    pub fn decay(&mut self) -> &[f32] {
        self.envelope.decay()
    }

    pub fn reset(&mut self) {
        self.fft.reset();
        self.envelope.reset();
    }

    pub fn bars(&self) -> &[f32] {
        self.envelope.displayed()
    }

    pub fn peaks(&self) -> &[f32] {
        self.envelope.peaks()
    }

    pub fn gain(&self) -> f32 {
        self.envelope.gain()
    }
}

/// Latest analysis output, readable from any thread without locking.
///
/// Each value is stored as the bit pattern of an `f32`; readers may see
/// bars from two consecutive blocks mixed, never a torn float.
#[derive(Debug)]
pub struct SpectrumFeed {
    bars: Vec<AtomicU32>,
    peaks: Vec<AtomicU32>,
    gain: AtomicU32,
    sample_rate: AtomicU32,
    generation: AtomicU64,
}

impl SpectrumFeed {
    pub fn new(bar_count: usize) -> Arc<Self> {
        Arc::new(Self {
            bars: (0..bar_count).map(|_| AtomicU32::new(0)).collect(),
            peaks: (0..bar_count).map(|_| AtomicU32::new(0)).collect(),
            gain: AtomicU32::new(1.0f32.to_bits()),
            sample_rate: AtomicU32::new(44_100),
            generation: AtomicU64::new(0),
        })
    }

    pub fn bars(&self) -> Vec<f32> {
        load_all(&self.bars)
    }

    pub fn peaks(&self) -> Vec<f32> {
        load_all(&self.peaks)
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.store(sample_rate.max(1), Ordering::Release);
    }

    /// Zero the published values and ask the worker to drop its history.
    pub fn request_reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        store_all(&self.bars, &[]);
        store_all(&self.peaks, &[]);
        self.gain.store(1.0f32.to_bits(), Ordering::Relaxed);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn publish(&self, visualizer: &Visualizer) {
        store_all(&self.bars, visualizer.bars());
        store_all(&self.peaks, visualizer.peaks());
        self.gain.store(visualizer.gain().to_bits(), Ordering::Relaxed);
    }
}

fn load_all(values: &[AtomicU32]) -> Vec<f32> {
    values
        .iter()
        .map(|v| f32::from_bits(v.load(Ordering::Relaxed)))
        .collect()
}

/// Store `source` into `values`, zero-filling anything past its end.
fn store_all(values: &[AtomicU32], source: &[f32]) {
    for (i, slot) in values.iter().enumerate() {
        let v = source.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
        slot.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Background thread that drains the capture ring into the visualizer.
pub struct AnalysisWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    pub fn spawn(config: &EngineConfig, consumer: HeapCons<f32>, feed: Arc<SpectrumFeed>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let visualizer = Visualizer::new(config);

        let handle = thread::Builder::new()
            .name("vizplay-analysis".into())
            .spawn(move || run_analysis(visualizer, consumer, feed, flag))
            .ok();
        if handle.is_none() {
            debug!("analysis worker could not be spawned; bars will stay idle");
        }

        Self { running, handle }
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_analysis(
    mut visualizer: Visualizer,
    mut consumer: HeapCons<f32>,
    feed: Arc<SpectrumFeed>,
    running: Arc<AtomicBool>,
) {
    let block_len = visualizer.fft_size();
    let mut block = vec![0.0f32; block_len];
    let mut seen_generation = feed.generation();
    let mut idle_polls = 0u32;

    while running.load(Ordering::Acquire) {
        let generation = feed.generation();
        if generation != seen_generation {
            visualizer.reset();
            consumer.clear();
            seen_generation = generation;
            idle_polls = 0;
        }

        let available = consumer.occupied_len();
        if available >= block_len {
            // Only the newest block matters; older audio has already been heard.
            consumer.skip(available - block_len);
            consumer.pop_slice(&mut block);
            visualizer.process(&block, feed.sample_rate());
            if feed.generation() == seen_generation {
                feed.publish(&visualizer);
            }
            trace!(gain = visualizer.gain(), "analyzed block");
            idle_polls = 0;
            continue;
        }

        idle_polls = idle_polls.saturating_add(1);
        if idle_polls > IDLE_POLLS_BEFORE_DECAY && visualizer.bars().iter().any(|&b| b > 0.0) {
            visualizer.decay();
            if feed.generation() == seen_generation {
                feed.publish(&visualizer);
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use ringbuf::HeapRb;

    use super::*;

    fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn pipeline_output_stays_in_range() {
        let mut viz = Visualizer::new(&EngineConfig::default());
        let loud: Vec<f32> = (0..1024).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut nan_laced = sine(300.0, 44_100, 1024);
        nan_laced[100] = f32::NAN;

        for block in [&loud, &nan_laced, &vec![0.0; 1024], &vec![1.0; 1024]] {
            for _ in 0..10 {
                let bars = viz.process(block, 44_100);
                assert_eq!(bars.len(), 32);
                assert!(bars.iter().all(|b| (0.0..=1.0).contains(b)));
            }
        }
    }

    #[test]
    fn tone_lights_its_band() {
        let mut viz = Visualizer::new(&EngineConfig::default());
        let block = sine(1000.0, 44_100, 1024);
        for _ in 0..20 {
            viz.process(&block, 44_100);
        }
        let bars = viz.bars();
        let loudest = bars
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert!(loudest.1 > 0.0);

        let layout = BandLayout::new(512, 44_100, 32, 60.0, 16_000.0);
        let range = &layout.ranges()[loudest.0];
        assert!(range.contains(&23) || range.contains(&24), "band {range:?}");
    }

    #[test]
    fn feed_reset_zeroes_values() {
        let feed = SpectrumFeed::new(4);
        store_all(&feed.bars, &[0.5, 0.6, 0.7, 0.8]);
        feed.request_reset();
        assert!(feed.bars().iter().all(|&b| b == 0.0));
        assert_eq!(feed.gain(), 1.0);
    }

    #[test]
    fn worker_publishes_and_decays() {
        let config = EngineConfig::default();
        let (mut producer, consumer) = HeapRb::<f32>::new(config.analysis.capture_capacity).split();
        let feed = SpectrumFeed::new(config.analysis.bar_count);
        let _worker = AnalysisWorker::spawn(&config, consumer, feed.clone());

        for _ in 0..4 {
            producer.push_slice(&sine(1000.0, 44_100, 1024));
        }
        assert!(wait_for(|| feed.bars().iter().any(|&b| b > 0.0)));

        let lit = feed.bars().iter().cloned().fold(0.0f32, f32::max);
        assert!(wait_for(|| {
            let now = feed.bars().iter().cloned().fold(0.0f32, f32::max);
            now < lit * 0.5
        }));
    }
}
