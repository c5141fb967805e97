// src/ui/layout.rs
//! Layout computation for the UI panels.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Visibility state for UI sections.
#[derive(Debug, Clone, Copy)]
pub struct SectionVisibility {
    pub playlist: bool,
    pub player: bool,
    pub visualizer: bool,
}

impl Default for SectionVisibility {
    fn default() -> Self {
        Self {
            playlist: true,
            player: true,
            visualizer: true,
        }
    }
}

impl SectionVisibility {
    /// Toggle a section by number (1-3).
    pub fn toggle(&mut self, section: usize) {
        match section {
            1 => self.playlist = !self.playlist,
            2 => self.player = !self.player,
            3 => self.visualizer = !self.visualizer,
            _ => {}
        }
    }
}

/// Computed layout areas for rendering.
#[derive(Debug, Default)]
pub struct ComputedLayout {
    pub playlist_area: Option<Rect>,
    pub player_area: Option<Rect>,
    /// Bottom visualizer area (if visible)
    pub visualizer_area: Option<Rect>,
}

/// Compute the layout based on total area and section visibility.
pub fn compute_layout(area: Rect, visibility: &SectionVisibility) -> ComputedLayout {
    let top_visible = visibility.playlist || visibility.player;

    // The spectrum takes the bottom 40%, or everything when it is alone.
    let (main_area, visualizer_area) = match (top_visible, visibility.visualizer) {
        (true, true) => {
            let vertical = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(area);
            (Some(vertical[0]), Some(vertical[1]))
        }
        (true, false) => (Some(area), None),
        (false, true) => (None, Some(area)),
        (false, false) => (None, None),
    };

    let Some(main_area) = main_area else {
        return ComputedLayout {
            visualizer_area,
            ..Default::default()
        };
    };

    let (playlist_area, player_area) = match (visibility.playlist, visibility.player) {
        (true, true) => {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
                .split(main_area);
            (Some(columns[0]), Some(columns[1]))
        }
        (true, false) => (Some(main_area), None),
        _ => (None, Some(main_area)),
    };

    ComputedLayout {
        playlist_area,
        player_area,
        visualizer_area,
    }
}
