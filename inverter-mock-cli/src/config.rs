//! Configuration loading and parsing
//!
//! Settings come from an optional TOML file; command line flags override
//! individual values. Every field has a default so the mock runs with no
//! configuration at all.

use anyhow::{bail, Context, Result};
use inverter_mock::server::DEFAULT_PORT;
use inverter_mock::DEFAULT_SIGNAL_ID;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub keys: KeysConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_dbc_file")]
    pub dbc_file: PathBuf,
    #[serde(default = "default_signal")]
    pub signal: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeysConfig {
    #[serde(default = "default_toggle_key")]
    pub toggle: char,
    #[serde(default = "default_quit_key")]
    pub quit: char,
}

fn default_dbc_file() -> PathBuf {
    PathBuf::from("INV_CAN_cm.dbc")
}

fn default_signal() -> String {
    DEFAULT_SIGNAL_ID.to_string()
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_toggle_key() -> char {
    'i'
}

fn default_quit_key() -> char {
    'q'
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            dbc_file: default_dbc_file(),
            signal: default_signal(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            toggle: default_toggle_key(),
            quit: default_quit_key(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Values given on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dbc_file: Option<PathBuf>,
    pub signal: Option<String>,
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub toggle_key: Option<char>,
    pub quit_key: Option<char>,
}

impl AppConfig {
    /// Apply command line overrides on top of the loaded values
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(dbc_file) = overrides.dbc_file {
            self.catalog.dbc_file = dbc_file;
        }
        if let Some(signal) = overrides.signal {
            self.catalog.signal = signal;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(toggle) = overrides.toggle_key {
            self.keys.toggle = toggle;
        }
        if let Some(quit) = overrides.quit_key {
            self.keys.quit = quit;
        }
    }

    /// Reject settings the control loop cannot work with
    pub fn validate(&self) -> Result<()> {
        let toggle = self.keys.toggle;
        let quit = self.keys.quit;

        for key in [toggle, quit] {
            if key.is_control() || key.is_whitespace() {
                bail!("Key binding {:?} is not a printable character", key);
            }
        }
        if toggle.to_lowercase().eq(quit.to_lowercase()) {
            bail!("Toggle and quit keys must differ (both are {:?})", toggle);
        }
        if self.catalog.signal.trim().is_empty() {
            bail!("Signal name must not be empty");
        }

        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
