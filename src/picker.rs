//! Raw-mode terminal driver for the shortcut picker.

use crate::render::{BOLD, GOLD, GRAY, LIME, PINK, RESET};
use anyhow::{Context, Result};
use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType};
use crossterm::{execute, queue};
use relay_core::picker::{PickerKey, PickerOption, PickerState, PickerStep};
use std::io::{self, Write};

const HINT: &str = "type to filter  ↑↓  Enter  Esc";

/// Restores cooked mode however the picker exits.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode for picker")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(error) = disable_raw_mode() {
            tracing::debug!(%error, "failed to disable raw mode");
        }
    }
}

/// Decode a key press into a picker key. Unhandled keys yield `None`.
pub fn map_key(key: KeyEvent) -> Option<PickerKey> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(PickerKey::Cancel),
        KeyCode::Esc => Some(PickerKey::Cancel),
        KeyCode::Enter => Some(PickerKey::Enter),
        KeyCode::Backspace => Some(PickerKey::Backspace),
        KeyCode::Up => Some(PickerKey::Up),
        KeyCode::Down => Some(PickerKey::Down),
        KeyCode::Char(c) if !c.is_control() => Some(PickerKey::Char(c)),
        _ => None,
    }
}

/// Lines drawn for the current state: prompt, rows, hint.
fn frame_lines(state: &PickerState) -> Vec<String> {
    let mut lines = vec![format!("  {PINK}{BOLD}  /{}▌{RESET}", state.query())];
    let visible = state.visible();
    if visible.is_empty() {
        lines.push(format!("  {GRAY}  no match{RESET}"));
    }
    for (i, option) in visible.iter().enumerate() {
        if i == state.cursor() {
            lines.push(format!(
                "  {LIME}{BOLD} ❯ /{:<18}{RESET}  {GRAY}{}{RESET}",
                option.name, option.description
            ));
        } else {
            lines.push(format!("    {GRAY}  /{:<18}  {}{RESET}", option.name, option.description));
        }
    }
    lines.push(format!("  {GRAY}{HINT}{RESET}"));
    lines
}

fn draw(out: &mut impl Write, state: &PickerState, previous: usize) -> Result<usize> {
    if previous > 0 {
        queue!(out, MoveUp(previous as u16), MoveToColumn(0), Clear(ClearType::FromCursorDown))?;
    }
    let lines = frame_lines(state);
    for line in &lines {
        // Raw mode: no implicit carriage return.
        write!(out, "{line}\r\n")?;
    }
    out.flush()?;
    Ok(lines.len())
}

/// Show `options` and block until one is chosen or the picker is cancelled.
pub fn pick(title: &str, options: Vec<PickerOption>) -> Result<Option<PickerOption>> {
    if options.is_empty() {
        println!("  {GRAY}nothing registered yet{RESET}");
        return Ok(None);
    }

    println!("\n  {GOLD}{BOLD}{title}{RESET}\n");
    let mut stdout = io::stdout();
    let mut state = PickerState::new(options);

    let result = {
        let _guard = RawModeGuard::enable()?;
        let mut drawn = draw(&mut stdout, &state, 0)?;
        loop {
            let key = match event::read().context("Failed to read picker input")? {
                Event::Key(key) => map_key(key),
                _ => None,
            };
            let Some(key) = key else { continue };
            match state.handle(key) {
                PickerStep::Continue => drawn = draw(&mut stdout, &state, drawn)?,
                PickerStep::Selected(option) => break Some(option),
                PickerStep::Cancelled => break None,
            }
        }
    };

    let _ = execute!(stdout, MoveToColumn(0));
    println!();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::resolver::NameKind;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(map_key(press(KeyCode::Char('a'), KeyModifiers::NONE)), Some(PickerKey::Char('a')));
        assert_eq!(map_key(press(KeyCode::Char('c'), KeyModifiers::CONTROL)), Some(PickerKey::Cancel));
        assert_eq!(map_key(press(KeyCode::Esc, KeyModifiers::NONE)), Some(PickerKey::Cancel));
        assert_eq!(map_key(press(KeyCode::Enter, KeyModifiers::NONE)), Some(PickerKey::Enter));
        assert_eq!(map_key(press(KeyCode::Tab, KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_release_events_ignored() {
        let mut key = press(KeyCode::Enter, KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(key), None);
    }

    #[test]
    fn test_frame_shows_no_match() {
        let mut state = PickerState::new(vec![PickerOption {
            name: "deploy".into(),
            description: "ship it".into(),
            kind: NameKind::Command,
        }]);
        assert_eq!(frame_lines(&state).len(), 3);
        state.handle(PickerKey::Char('z'));
        let lines = frame_lines(&state);
        assert!(lines[1].contains("no match"));
    }
}
