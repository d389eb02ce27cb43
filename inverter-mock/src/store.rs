//! Shared telemetry store
//!
//! Holds the one signal the mock serves. The value lives in an atomic so the
//! HTTP thread can read it while the control loop toggles it without ever
//! seeing a half-written value.

use crate::types::{InverterState, Snapshot};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Handle to the telemetry store
///
/// Cloning the handle is cheap; all clones observe the same value.
#[derive(Debug, Clone)]
pub struct TelemetryStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    signal: String,
    state: AtomicU8,
}

impl TelemetryStore {
    /// Create a store for `signal`, starting inactive (8)
    pub fn new(signal: impl Into<String>) -> Self {
        Self::with_state(signal, InverterState::Inactive)
    }

    /// Create a store for `signal` starting at `state`
    pub fn with_state(signal: impl Into<String>, state: InverterState) -> Self {
        Self {
            inner: Arc::new(Inner {
                signal: signal.into(),
                state: AtomicU8::new(state.raw()),
            }),
        }
    }

    /// Name of the served signal
    pub fn signal(&self) -> &str {
        &self.inner.signal
    }

    /// Current inverter state
    pub fn state(&self) -> InverterState {
        // Only raw values of InverterState are ever stored
        InverterState::from_raw(self.inner.state.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Consistent one-entry view of the store
    pub fn read(&self) -> Snapshot {
        Snapshot {
            signal: self.inner.signal.clone(),
            state: self.state(),
        }
    }

    /// Flip the state between 8 and 9 and return the new state
    pub fn toggle(&self) -> InverterState {
        let previous = self
            .inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let current = InverterState::from_raw(raw).unwrap_or_default();
                Some(current.toggled().raw())
            })
            .unwrap_or_else(|raw| raw);

        let new_state = InverterState::from_raw(previous)
            .unwrap_or_default()
            .toggled();
        log::info!("Toggled {} to {}", self.inner.signal, new_state);
        new_state
    }
}
