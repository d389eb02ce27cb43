//! Interactive control loop
//!
//! Keeps the main thread alive while the HTTP service runs in the
//! background. Handlers are registered for the toggle and quit keys; the
//! loop polls its key source at a coarse interval and stops on quit, on
//! Ctrl+C, or when the process receives an interrupt signal.

use crate::keys::{KeyAction, KeySource};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Interval between keep-alive polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why the control loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The quit key was pressed
    Quit,
    /// Ctrl+C or a termination signal
    Interrupted,
}

/// Flag set from a signal handler to stop the loop
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

type Handler = Box<dyn FnMut()>;

/// Dispatches key actions to registered handlers
pub struct ControlLoop {
    toggle_handlers: Vec<Handler>,
    quit_handlers: Vec<Handler>,
    cancellation: Cancellation,
    poll_interval: Duration,
}

impl ControlLoop {
    pub fn new(cancellation: Cancellation) -> Self {
        Self {
            toggle_handlers: Vec::new(),
            quit_handlers: Vec::new(),
            cancellation,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Run `handler` on every toggle key press
    pub fn on_toggle(&mut self, handler: impl FnMut() + 'static) -> &mut Self {
        self.toggle_handlers.push(Box::new(handler));
        self
    }

    /// Run `handler` once when the quit key is pressed
    pub fn on_quit(&mut self, handler: impl FnMut() + 'static) -> &mut Self {
        self.quit_handlers.push(Box::new(handler));
        self
    }

    /// Block until quit or interrupt
    pub fn run<S: KeySource>(&mut self, keys: &mut S) -> io::Result<ExitReason> {
        log::debug!("Control loop started (poll interval {:?})", self.poll_interval);

        loop {
            if self.cancellation.is_cancelled() {
                return Ok(ExitReason::Interrupted);
            }

            match keys.next_action(self.poll_interval)? {
                Some(KeyAction::Toggle) => {
                    for handler in &mut self.toggle_handlers {
                        handler();
                    }
                }
                Some(KeyAction::Quit) => {
                    for handler in &mut self.quit_handlers {
                        handler();
                    }
                    return Ok(ExitReason::Quit);
                }
                Some(KeyAction::Interrupt) => return Ok(ExitReason::Interrupted),
                None => {}
            }
        }
    }
}

/// Print a status line that stays readable while the terminal is in raw mode
pub fn echo(line: impl std::fmt::Display) {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "{}\r\n", line);
    let _ = stdout.flush();
}
