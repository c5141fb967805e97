// src/ui/widgets/playlist.rs
//! Playlist widget.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState},
};

use crate::app::PlaylistCursor;

/// Render the playlist with the current track marked.
pub fn render_playlist(
    f: &mut Frame<'_>,
    area: Rect,
    playlist: &PlaylistCursor,
    state: &mut ListState,
) {
    let current = playlist.index();
    let items: Vec<ListItem> = playlist
        .items()
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let marker = if Some(i) == current { "\u{f001}" } else { " " };
            let name = source.title().unwrap_or("Unknown");
            let item = ListItem::new(format!("{marker} {name}"));
            if Some(i) == current {
                item.style(Style::default().fg(Color::Cyan))
            } else {
                item
            }
        })
        .collect();

    let title = format!("1: Playlist ({})", playlist.len());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, state);
}
