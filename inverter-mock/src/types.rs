//! Core types for the inverter state mock
//!
//! This module defines the values the mock hands around: the two-state
//! inverter value, the one-entry snapshot served over HTTP, and the error
//! type shared by the catalog loader and the HTTP service.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Result type for mock operations
pub type Result<T> = std::result::Result<T, MockError>;

/// Signal identifier used when the DBC catalog cannot confirm one
pub const DEFAULT_SIGNAL_ID: &str = "M170_Internal_States.INV_Inverter_State";

/// Mocked inverter state
///
/// Only the two values the dashboard distinguishes are representable,
/// so the value is always 8 or 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum InverterState {
    /// Inverter idle (raw value 8)
    #[default]
    Inactive = 8,
    /// Inverter running (raw value 9)
    Active = 9,
}

impl InverterState {
    /// Raw signal value as published on the CAN bus
    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Interpret a raw value; anything but 8 or 9 is rejected
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            8 => Some(InverterState::Inactive),
            9 => Some(InverterState::Active),
            _ => None,
        }
    }

    /// The state a toggle moves to: 9 unless already 9, then 8
    pub fn toggled(self) -> Self {
        match self {
            InverterState::Active => InverterState::Inactive,
            InverterState::Inactive => InverterState::Active,
        }
    }
}

impl fmt::Display for InverterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw())
    }
}

impl Serialize for InverterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.raw())
    }
}

/// A consistent view of the telemetry store
///
/// Serializes as a JSON object with exactly one key, e.g.
/// `{"M170_Internal_States.INV_Inverter_State": 8}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Fully qualified signal name (`Message.Signal`)
    pub signal: String,
    /// Current value of the signal
    pub state: InverterState,
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.signal, &self.state)?;
        map.end()
    }
}

/// Errors that can occur while resolving the catalog or serving requests
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Failed to read DBC file {path:?}: {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse DBC file: {0}")]
    CatalogParse(String),

    #[error("Signal not found in {path:?}: {signal}")]
    SignalNotFound { signal: String, path: PathBuf },

    #[error("Failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start HTTP query service: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverter_state_raw_values() {
        assert_eq!(InverterState::Inactive.raw(), 8);
        assert_eq!(InverterState::Active.raw(), 9);
        assert_eq!(InverterState::default(), InverterState::Inactive);

        assert_eq!(InverterState::from_raw(8), Some(InverterState::Inactive));
        assert_eq!(InverterState::from_raw(9), Some(InverterState::Active));
        assert_eq!(InverterState::from_raw(0), None);
        assert_eq!(InverterState::from_raw(10), None);
    }

    #[test]
    fn test_toggle_flips_between_states() {
        assert_eq!(InverterState::Inactive.toggled(), InverterState::Active);
        assert_eq!(InverterState::Active.toggled(), InverterState::Inactive);
    }

    #[test]
    fn test_snapshot_serializes_as_single_entry_object() {
        let snapshot = Snapshot {
            signal: DEFAULT_SIGNAL_ID.to_string(),
            state: InverterState::Active,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"M170_Internal_States.INV_Inverter_State":9}"#);
    }

    #[test]
    fn test_error_messages() {
        let err = MockError::SignalNotFound {
            signal: "Foo.Bar".to_string(),
            path: PathBuf::from("inv.dbc"),
        };
        assert_eq!(err.to_string(), "Signal not found in \"inv.dbc\": Foo.Bar");

        let err = MockError::Runtime(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no reactor",
        ));
        assert_eq!(err.to_string(), "Failed to start HTTP query service: no reactor");
        assert!(std::error::Error::source(&err).is_some());
    }
}
