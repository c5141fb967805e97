// src/ui/tui.rs
//! Terminal setup and the main event loop.

use std::{
    io,
    time::{Duration, Instant},
};

use anyhow::Result;
use crossterm::{
    event::{self, Event as CEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::warn;

use crate::app::App;

/// Redraw rate; also bounds how stale the spectrum can look.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Take over the terminal and run `app` until the user quits.
pub fn run(mut app: App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut last_frame = Instant::now();

    loop {
        terminal.draw(|f| app.draw(f))?;

        let mut timeout = FRAME_INTERVAL.saturating_sub(last_frame.elapsed());
        if let Some(due) = app.next_deadline(Instant::now()) {
            timeout = timeout.min(due);
        }

        if event::poll(timeout)? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.on_key(key) {
                    return Ok(());
                }
            }
        }

        if let Err(e) = app.tick(Instant::now()) {
            warn!(error = %e, "tick failed");
            app.status_line = Some(e.to_string());
        }

        if last_frame.elapsed() >= FRAME_INTERVAL {
            last_frame = Instant::now();
        }
    }
}
