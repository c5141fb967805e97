// src/ui/widgets/player_panel.rs
//! Player information panel widget.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};

use crate::app::NowPlayingSnapshot;
use crate::audio::PlaybackState;

/// Render the player information panel.
pub fn render_player_panel(
    f: &mut Frame<'_>,
    area: Rect,
    now_playing: Option<&NowPlayingSnapshot>,
    elapsed: f64,
    duration: f64,
    state: PlaybackState,
    status_line: Option<&str>,
) {
    let title = "2: Player";
    f.render_widget(Block::default().borders(Borders::ALL).title(title), area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(area);

    let mut lines = match now_playing {
        Some(np) => vec![
            Line::from(Span::styled(
                np.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(np.artist.clone()),
        ],
        None => vec![Line::from("No track playing")],
    };
    lines.push(Line::from(Span::styled(
        format!("{state:?}"),
        Style::default().fg(Color::DarkGray),
    )));
    if let Some(msg) = status_line {
        lines.push(Line::from(Span::styled(
            msg.to_string(),
            Style::default().fg(Color::Red),
        )));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner[0]);

    // Playback control buttons
    let play_pause_icon = match state {
        PlaybackState::Playing => Span::styled(" ⏸ ", Style::default().fg(Color::Green)),
        PlaybackState::Paused => Span::styled(" ⏵ ", Style::default().fg(Color::Yellow)),
        _ => Span::styled(" ⏵ ", Style::default().fg(Color::Gray)),
    };

    let controls = Line::from(vec![
        Span::styled(" ⏮ ", Style::default().fg(Color::Cyan)), // Previous (p/<)
        Span::raw(" "),
        Span::styled(" ⏹ ", Style::default().fg(Color::Red)), // Stop (s)
        Span::raw(" "),
        play_pause_icon, // Play/Pause (space)
        Span::raw(" "),
        Span::styled(" ⏭ ", Style::default().fg(Color::Cyan)), // Next (n/>)
    ]);

    f.render_widget(
        Paragraph::new(controls).alignment(Alignment::Center),
        inner[1],
    );

    // Progress bar with time display
    let ratio = if duration > 0.0 {
        (elapsed / duration).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let time_label = format!("{} / {}", format_time(elapsed), format_time(duration));

    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::ITALIC))
            .ratio(ratio)
            .label(time_label),
        inner[2],
    );
}

/// `mm:ss`, with negative and non-finite values shown as zero.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    format!("{:02}:{:02}", total / 60, total % 60)
}
