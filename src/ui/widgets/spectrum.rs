// src/ui/widgets/spectrum.rs
//! Spectrum bars with peak markers.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

/// Partial-cell glyphs, from an eighth to a full block.
const EIGHTHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const PEAK: char = '▔';
const BAR_WIDTH: usize = 2;
const BAR_GAP: usize = 1;

/// Render bar levels in `[0, 1]` bottom-up, with each band's held peak
/// drawn as a thin marker above it. The title carries the current AGC gain.
pub fn render_spectrum(f: &mut Frame<'_>, area: Rect, bars: &[f32], peaks: &[f32], gain: f32) {
    let block = Block::default().borders(Borders::ALL).title(spectrum_title(gain));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let rows = spectrum_rows(bars, peaks, inner.width as usize, inner.height as usize);
    let lines: Vec<Line> = rows
        .into_iter()
        .enumerate()
        .map(|(row, text)| {
            let color = row_color(row, inner.height as usize);
            Line::from(Span::styled(text, Style::default().fg(color)))
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn spectrum_title(gain: f32) -> String {
    format!("3: Spectrum (gain {gain:.2}x)")
}

/// Colour by height: the top rows run hot.
fn row_color(row: usize, height: usize) -> Color {
    let from_bottom = height - row - 1;
    match from_bottom * 3 / height.max(1) {
        0 => Color::Green,
        1 => Color::Yellow,
        _ => Color::Red,
    }
}

/// Lay the bars out as `height` text rows of exactly `width` cells, top row first.
fn spectrum_rows(bars: &[f32], peaks: &[f32], width: usize, height: usize) -> Vec<String> {
    let spacing = BAR_WIDTH + BAR_GAP;
    let shown = (width / spacing).min(bars.len());
    // Centre the bars horizontally.
    let left_pad = (width - shown * spacing) / 2;

    (0..height)
        .map(|row| {
            let from_bottom = height - row - 1;
            let mut line = String::with_capacity(width * 3);
            line.extend(std::iter::repeat_n(' ', left_pad));
            for i in 0..shown {
                let level = bars[i];
                let peak = peaks.get(i).copied().unwrap_or(0.0);
                let c = cell_for(level, peak, from_bottom, height);
                line.extend(std::iter::repeat_n(c, BAR_WIDTH));
                line.extend(std::iter::repeat_n(' ', BAR_GAP));
            }
            let used = left_pad + shown * spacing;
            line.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
            line
        })
        .collect()
}

/// Glyph for one cell of a bar, `from_bottom` rows above the baseline.
fn cell_for(level: f32, peak: f32, from_bottom: usize, height: usize) -> char {
    let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
    let eighths = (level * (height * 8) as f32).round() as usize;
    let full_rows = eighths / 8;
    let remainder = eighths % 8;

    if from_bottom < full_rows {
        return '█';
    }
    if from_bottom == full_rows && remainder > 0 {
        return EIGHTHS[remainder - 1];
    }

    let peak_row = ((peak.clamp(0.0, 1.0) * height as f32) as usize).min(height - 1);
    if peak > level && peak_row == from_bottom && peak_row >= full_rows {
        return PEAK;
    }
    if eighths == 0 && from_bottom == 0 {
        // Always show minimum bar at bottom row
        return EIGHTHS[0];
    }
    ' '
}
