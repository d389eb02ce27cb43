//! Signal catalog loader
//!
//! Parses a Vector DBC file and collects the fully qualified names
//! (`Message.Signal`) of every signal it defines. The mock only uses the
//! catalog to confirm that the signal it serves really exists; loading is
//! best effort and never stops the program.

use crate::types::{MockError, Result, DEFAULT_SIGNAL_ID};
use std::collections::BTreeSet;
use std::path::Path;

/// Signal names defined by a DBC file
#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    /// Fully qualified signal names
    signals: BTreeSet<String>,
    /// Number of CAN messages in the file
    num_messages: usize,
}

impl SignalCatalog {
    /// Parse a DBC file into a catalog
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Parsing DBC file: {:?}", path);

        // Read the DBC file as bytes first (handle non-UTF8 encodings)
        let bytes = std::fs::read(path).map_err(|source| MockError::CatalogRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_bytes(&bytes, path)
    }

    /// Parse DBC content that was already read from `origin`
    pub fn from_bytes(bytes: &[u8], origin: &Path) -> Result<Self> {
        // Try UTF-8 first, then fall back to Latin-1 (compatible with Windows-1252)
        let dbc_content = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
                bytes.iter().map(|&b| b as char).collect()
            }
        };

        let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
            MockError::CatalogParse(format!("{:?}: {:?}", origin, e))
        })?;

        let mut catalog = SignalCatalog::default();
        for message in dbc.messages() {
            catalog.num_messages += 1;
            for signal in message.signals() {
                catalog
                    .signals
                    .insert(format!("{}.{}", message.message_name(), signal.name()));
            }
        }

        log::info!(
            "Parsed {} messages ({} signals) from {:?}",
            catalog.num_messages,
            catalog.signals.len(),
            origin
        );

        Ok(catalog)
    }

    /// True if `name` (as `Message.Signal`) is defined
    pub fn contains(&self, name: &str) -> bool {
        self.signals.contains(name)
    }

    /// Number of CAN messages in the catalog
    pub fn num_messages(&self) -> usize {
        self.num_messages
    }

    /// Number of signals in the catalog
    pub fn num_signals(&self) -> usize {
        self.signals.len()
    }

    /// Iterate over all fully qualified signal names, sorted
    pub fn signal_names(&self) -> impl Iterator<Item = &str> {
        self.signals.iter().map(String::as_str)
    }
}

/// Load the catalog at `path` and confirm that `target` is one of its signals
pub fn resolve_signal(path: &Path, target: &str) -> Result<String> {
    let catalog = SignalCatalog::load(path)?;

    if !catalog.contains(target) {
        return Err(MockError::SignalNotFound {
            signal: target.to_string(),
            path: path.to_path_buf(),
        });
    }

    println!("✓ Loaded DBC file: {:?}", path);
    println!("✓ Available CAN messages: {}", catalog.num_messages());
    Ok(target.to_string())
}

/// Resolve `target` against the catalog, falling back to the default name
///
/// A missing, unreadable or malformed file, or one that lacks the signal,
/// is reported and otherwise ignored.
pub fn resolve_or_default(path: &Path, target: &str) -> String {
    match resolve_signal(path, target) {
        Ok(signal) => {
            println!("✓ Using inverter state key: {}", signal);
            signal
        }
        Err(e) => {
            log::warn!("Signal catalog unavailable: {}", e);
            println!("{}", failure_message(path, &e));
            println!("  Continuing with default key: {}", DEFAULT_SIGNAL_ID);
            DEFAULT_SIGNAL_ID.to_string()
        }
    }
}

/// Status line shown when the catalog cannot confirm the signal
fn failure_message(path: &Path, err: &MockError) -> String {
    match err {
        MockError::SignalNotFound { signal, .. } => {
            format!("✗ Signal {} is not defined in DBC file {:?}", signal, path)
        }
        other => format!("✗ Error loading DBC file {:?}: {}", path, other),
    }
}
