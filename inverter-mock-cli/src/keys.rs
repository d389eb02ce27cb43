//! Keyboard input
//!
//! Translates terminal key presses into the actions the control loop
//! understands. The terminal is put into raw mode so single key presses
//! arrive without waiting for Enter; raw mode is restored when the
//! [`TerminalKeys`] source is dropped.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io;
use std::time::Duration;

/// What a key press asks the control loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Flip the inverter state
    Toggle,
    /// Leave immediately
    Quit,
    /// Ctrl+C typed in the terminal
    Interrupt,
}

/// Bindings from characters to actions
#[derive(Debug, Clone, Copy)]
pub struct KeyMap {
    pub toggle: char,
    pub quit: char,
}

impl KeyMap {
    /// Map a terminal key event to an action
    ///
    /// Letters match regardless of case. Releases and repeats are ignored.
    pub fn action_for(&self, key: &KeyEvent) -> Option<KeyAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        let KeyCode::Char(c) = key.code else {
            return None;
        };

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return c.eq_ignore_ascii_case(&'c').then_some(KeyAction::Interrupt);
        }

        if same_key(c, self.toggle) {
            Some(KeyAction::Toggle)
        } else if same_key(c, self.quit) {
            Some(KeyAction::Quit)
        } else {
            None
        }
    }
}

fn same_key(a: char, b: char) -> bool {
    a.to_lowercase().eq(b.to_lowercase())
}

/// Source of key actions for the control loop
pub trait KeySource {
    /// Wait up to `timeout` for the next action
    ///
    /// Returns `Ok(None)` when nothing relevant happened in that time.
    fn next_action(&mut self, timeout: Duration) -> io::Result<Option<KeyAction>>;
}

/// Key actions read from the controlling terminal
#[derive(Debug)]
pub struct TerminalKeys {
    keymap: KeyMap,
}

impl TerminalKeys {
    /// Enter raw mode and start reading keys
    pub fn new(keymap: KeyMap) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        log::debug!("Terminal raw mode enabled");
        Ok(Self { keymap })
    }
}

impl KeySource for TerminalKeys {
    fn next_action(&mut self, timeout: Duration) -> io::Result<Option<KeyAction>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }

        match event::read()? {
            Event::Key(key) => Ok(self.keymap.action_for(&key)),
            _ => Ok(None),
        }
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYMAP: KeyMap = KeyMap {
        toggle: 'i',
        quit: 'q',
    };

    fn press(c: char, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), modifiers)
    }

    #[test]
    fn test_bound_keys() {
        assert_eq!(
            KEYMAP.action_for(&press('i', KeyModifiers::NONE)),
            Some(KeyAction::Toggle)
        );
        assert_eq!(
            KEYMAP.action_for(&press('I', KeyModifiers::SHIFT)),
            Some(KeyAction::Toggle)
        );
        assert_eq!(
            KEYMAP.action_for(&press('q', KeyModifiers::NONE)),
            Some(KeyAction::Quit)
        );
        assert_eq!(KEYMAP.action_for(&press('x', KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_ctrl_c_interrupts() {
        assert_eq!(
            KEYMAP.action_for(&press('c', KeyModifiers::CONTROL)),
            Some(KeyAction::Interrupt)
        );
        // Ctrl+I is not the toggle key
        assert_eq!(KEYMAP.action_for(&press('i', KeyModifiers::CONTROL)), None);
    }

    #[test]
    fn test_release_and_other_keys_ignored() {
        let release =
            KeyEvent::new_with_kind(KeyCode::Char('i'), KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(KEYMAP.action_for(&release), None);

        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(KEYMAP.action_for(&enter), None);
    }
}
