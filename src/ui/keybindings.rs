// src/ui/keybindings.rs
//! Keyboard input handling and key mappings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Map digit/shifted-digit keys to section number (1..3).
pub fn map_key_to_digit(k: &KeyEvent) -> Option<usize> {
    if let KeyCode::Char(c) = k.code {
        match c {
            '1' | '!' => Some(1),
            '2' | '@' => Some(2),
            '3' | '#' => Some(3),
            _ => None,
        }
    } else {
        None
    }
}

/// Check if the key event is a shifted symbol (!, @, #).
pub fn is_shifted_symbol(key: &KeyEvent) -> bool {
    matches!(
        key.code,
        KeyCode::Char('!') | KeyCode::Char('@') | KeyCode::Char('#')
    )
}

/// Transport and view actions derived from key events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    TogglePlayPause,
    Next,
    Previous,
    SeekBackward,
    SeekForward,
    Stop,
    Quit,
    ToggleSection(usize),
    None,
}

/// Convert a key event to an action.
pub fn key_to_action(key: &KeyEvent) -> Action {
    // Check for section toggle first
    if let Some(d) = map_key_to_digit(key) {
        if key.modifiers.contains(KeyModifiers::SHIFT) || is_shifted_symbol(key) {
            return Action::ToggleSection(d);
        }
    }

    match key.code {
        KeyCode::Char(' ') => Action::TogglePlayPause,
        KeyCode::Char('n') | KeyCode::Char('>') => Action::Next,
        KeyCode::Char('p') | KeyCode::Char('<') => Action::Previous,
        KeyCode::Left => Action::SeekBackward,
        KeyCode::Right => Action::SeekForward,
        KeyCode::Char('s') => Action::Stop,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}
