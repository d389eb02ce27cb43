//! Inverter State Mock Library
//!
//! A small test harness that stands in for the vehicle when developing the
//! dashboard. It serves one mock telemetry value, the inverter state, over
//! HTTP and lets the application layer flip it between its two states.
//!
//! # Architecture
//!
//! - [`catalog`] resolves the served signal name against a DBC file, falling
//!   back to a fixed default when the file is unusable
//! - [`store`] holds the current value behind a cloneable handle
//! - [`server`] answers `GET /vehicle_data` on a background thread
//!
//! Keyboard handling and process lifetime live in the application layer
//! (inverter-mock-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use inverter_mock::{catalog, TelemetryServer, TelemetryStore, DEFAULT_SIGNAL_ID};
//! use std::path::Path;
//!
//! let signal = catalog::resolve_or_default(Path::new("INV_CAN_cm.dbc"), DEFAULT_SIGNAL_ID);
//! let store = TelemetryStore::new(signal);
//!
//! let server = TelemetryServer::bind(inverter_mock::server::DEFAULT_ADDR, store.clone()).unwrap();
//! server.spawn().unwrap();
//!
//! store.toggle();
//! ```

pub mod catalog;
pub mod server;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use catalog::SignalCatalog;
pub use server::TelemetryServer;
pub use store::TelemetryStore;
pub use types::{InverterState, MockError, Result, Snapshot, DEFAULT_SIGNAL_ID};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
