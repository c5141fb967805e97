// src/audio/visualizer/bands.rs
//! Log-spaced grouping of spectrum bins into visual bars.

use std::ops::Range;

use crate::config::AnalysisConfig;

const AVERAGE_WEIGHT: f32 = 0.7;
const PEAK_WEIGHT: f32 = 0.3;

/// Maps a magnitude spectrum onto a fixed number of bars.
pub struct BandAggregator {
    bar_count: usize,
    min_hz: f32,
    max_hz: f32,
    layout: Option<BandLayout>,
    bars: Vec<f32>,
}

/// Bin ranges and center frequencies for one `(bins, sample_rate)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    bins: usize,
    sample_rate: u32,
    ranges: Vec<Range<usize>>,
    centers: Vec<f32>,
}

impl BandAggregator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            bar_count: config.bar_count,
            min_hz: config.min_frequency_hz,
            max_hz: config.max_frequency_hz,
            layout: None,
            bars: vec![0.0; config.bar_count],
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    /// Group `magnitudes` (bins spanning 0 Hz to Nyquist) into bars in `[0, 1]`.
    pub fn aggregate(&mut self, magnitudes: &[f32], sample_rate: u32) -> &[f32] {
        if magnitudes.is_empty() {
            self.bars.fill(0.0);
            return &self.bars;
        }

        let stale = self
            .layout
            .as_ref()
            .is_none_or(|l| l.bins != magnitudes.len() || l.sample_rate != sample_rate);
        if stale {
            self.layout = Some(BandLayout::new(
                magnitudes.len(),
                sample_rate,
                self.bar_count,
                self.min_hz,
                self.max_hz,
            ));
        }
        let Some(layout) = &self.layout else {
            return &self.bars;
        };

        for ((bar, range), &center) in self
            .bars
            .iter_mut()
            .zip(&layout.ranges)
            .zip(&layout.centers)
        {
            let slice = &magnitudes[range.clone()];
            let (sum, max) = slice.iter().fold((0.0f32, 0.0f32), |(sum, max), &m| {
                let m = if m.is_finite() { m } else { 0.0 };
                (sum + m, max.max(m))
            });
            let average = sum / slice.len() as f32;

            let raw = (average * AVERAGE_WEIGHT + max * PEAK_WEIGHT) * low_frequency_boost(center);
            *bar = compress(raw);
        }

        &self.bars
    }
}

impl BandLayout {
    /// Compute contiguous, non-empty bin ranges between `min_hz` and
    /// `max_hz` (capped at Nyquist) on a logarithmic scale.
    pub fn new(bins: usize, sample_rate: u32, bar_count: usize, min_hz: f32, max_hz: f32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let max_hz = max_hz.min(nyquist);
        let min_hz = min_hz.min(max_hz * 0.5).max(1.0);
        let bin_hz = nyquist / bins as f32;

        let log_min = min_hz.log10();
        let log_max = max_hz.log10();
        let edge_hz = |i: usize| {
            let t = i as f32 / bar_count as f32;
            10f32.powf(log_min + (log_max - log_min) * t)
        };

        let mut ranges = Vec::with_capacity(bar_count);
        let mut centers = Vec::with_capacity(bar_count);
        let mut next_start = 0usize;

        for i in 0..bar_count {
            let low_hz = edge_hz(i);
            let high_hz = edge_hz(i + 1);

            let mut start = ((low_hz / bin_hz) as usize).max(next_start);
            start = start.min(bins - 1);
            let end = ((high_hz / bin_hz) as usize).min(bins).max(start + 1);

            next_start = end;
            ranges.push(start..end);
            centers.push((low_hz + high_hz) / 2.0);
        }

        Self {
            bins,
            sample_rate,
            ranges,
            centers,
        }
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn centers(&self) -> &[f32] {
        &self.centers
    }
}

/// Gain applied to bands to offset the natural low-frequency roll-off.
fn low_frequency_boost(center_hz: f32) -> f32 {
    if center_hz < 200.0 {
        1.5
    } else if center_hz < 500.0 {
        1.2
    } else {
        1.0
    }
}

/// Soft `tanh` knee that keeps bars below saturation.
fn compress(raw: f32) -> f32 {
    if !raw.is_finite() {
        return 0.0;
    }
    ((raw * 2.0).tanh() / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> BandAggregator {
        BandAggregator::new(&AnalysisConfig::default())
    }

    #[test]
    fn layout_is_contiguous_and_non_empty() {
        let layout = BandLayout::new(512, 44_100, 32, 60.0, 16_000.0);
        assert_eq!(layout.ranges().len(), 32);
        for range in layout.ranges() {
            assert!(range.end > range.start);
            assert!(range.end <= 512);
        }
        for pair in layout.ranges().windows(2) {
            assert!(pair[1].start >= pair[0].end);
        }
    }

    #[test]
    fn layout_caps_at_nyquist() {
        let layout = BandLayout::new(512, 16_000, 32, 60.0, 16_000.0);
        assert!(layout.ranges().iter().all(|r| r.end <= 512));
        assert!(layout.centers().iter().all(|&c| c <= 8_000.0));
    }

    #[test]
    fn many_bars_on_few_bins_stay_in_bounds() {
        let layout = BandLayout::new(16, 8_000, 64, 60.0, 16_000.0);
        for range in layout.ranges() {
            assert!(range.start < 16 && range.end <= 16 && range.end > range.start);
        }
    }

    #[test]
    fn silent_spectrum_yields_silent_bars() {
        let mut bands = aggregator();
        let bars = bands.aggregate(&[0.0; 512], 44_100);
        assert_eq!(bars.len(), 32);
        assert!(bars.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn full_scale_spectrum_stays_below_saturation() {
        let mut bands = aggregator();
        let bars = bands.aggregate(&[1.0; 512], 44_100);
        assert!(bars.iter().all(|&b| b > 0.0 && b < 1.0));
    }

    #[test]
    fn low_bands_are_boosted() {
        let mut bands = aggregator();
        let bars = bands.aggregate(&[0.1; 512], 44_100).to_vec();
        assert!(bars[0] > bars[31]);
    }

    #[test]
    fn nan_bins_are_ignored() {
        let mut bands = aggregator();
        let mut spectrum = vec![0.5; 512];
        spectrum[5] = f32::NAN;
        spectrum[100] = f32::INFINITY;
        let bars = bands.aggregate(&spectrum, 44_100);
        assert!(bars.iter().all(|b| b.is_finite() && (0.0..=1.0).contains(b)));
    }
}
