//! Inverter State Mock CLI Application
//!
//! Command-line front end for the inverter-mock library. It adds:
//! - Configuration (config.toml + command line overrides)
//! - Keyboard control of the mocked inverter state
//! - Process lifetime (quit key, Ctrl+C, termination signals)

use anyhow::{Context, Result};
use clap::Parser;
use inverter_mock::server::VEHICLE_DATA_PATH;
use inverter_mock::{catalog, TelemetryServer, TelemetryStore};
use std::net::IpAddr;
use std::path::PathBuf;

mod config;
mod control;
mod keys;

use config::{AppConfig, Overrides};
use control::{echo, Cancellation, ControlLoop, ExitReason};
use keys::{KeyMap, TerminalKeys};

/// Inverter State Mock - Serve a toggleable inverter state over HTTP
#[derive(Parser, Debug)]
#[command(name = "inverter-mock")]
#[command(about = "Serve a mock inverter state at /vehicle_data and toggle it from the keyboard", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the DBC file used to confirm the signal name
    #[arg(long, value_name = "FILE")]
    dbc: Option<PathBuf>,

    /// Fully qualified signal name to serve (Message.Signal)
    #[arg(long, value_name = "NAME")]
    signal: Option<String>,

    /// Address to bind the HTTP service on
    #[arg(long, value_name = "IP")]
    host: Option<IpAddr>,

    /// Port to bind the HTTP service on
    #[arg(short, long)]
    port: Option<u16>,

    /// Key that toggles the inverter state
    #[arg(long, value_name = "KEY")]
    toggle_key: Option<char>,

    /// Key that quits the mock
    #[arg(long, value_name = "KEY")]
    quit_key: Option<char>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Inverter State Mock CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using inverter-mock library v{}", inverter_mock::VERSION);

    let config = build_config(args)?;

    println!("═══════════════════════════════════════════════");
    println!("  Inverter State Mock");
    println!("═══════════════════════════════════════════════\n");

    // Resolve the served signal; never fatal
    let signal = catalog::resolve_or_default(&config.catalog.dbc_file, &config.catalog.signal);
    let store = TelemetryStore::new(signal);

    // Bind before spawning so a busy port aborts startup
    let server = TelemetryServer::bind(config.server.socket_addr(), store.clone())
        .context("Failed to start HTTP query service")?;
    let addr = server.local_addr()?;
    server
        .spawn()
        .context("Failed to start HTTP query service thread")?;
    println!("\n🌐 Serving http://{}{}", addr, VEHICLE_DATA_PATH);

    let cancellation = Cancellation::new();
    {
        let cancellation = cancellation.clone();
        ctrlc::set_handler(move || cancellation.cancel())
            .context("Failed to install interrupt handler")?;
    }

    let keymap = KeyMap {
        toggle: config.keys.toggle,
        quit: config.keys.quit,
    };

    println!("\n==== Inverter State Toggler ====");
    println!("Press '{}' to toggle inverter state between 8 and 9", keymap.toggle);
    println!("Press '{}' to quit", keymap.quit);

    let reason = {
        let mut keys =
            TerminalKeys::new(keymap).context("Keyboard control needs an interactive terminal")?;

        let mut control = ControlLoop::new(cancellation);
        control.on_toggle(move || {
            let state = store.toggle();
            echo(format!("🔄 Toggled inverter state to {}", state));
        });
        control.on_quit(|| log::debug!("Quit key pressed"));

        control.run(&mut keys)?
        // Raw mode is restored here when `keys` is dropped
    };

    log::debug!("Control loop finished: {:?}", reason);
    match reason {
        ExitReason::Quit => println!("\nExiting..."),
        ExitReason::Interrupted => println!("\nInterrupted, exiting..."),
    }

    // The HTTP thread is not joined; nothing needs flushing
    std::process::exit(0)
}

/// Merge the optional config file with command line overrides
fn build_config(args: Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(config_path) => {
            log::info!("Loading configuration from: {:?}", config_path);
            let config = config::load_config(config_path)?;
            log::debug!("Configuration loaded successfully");
            config
        }
        None => AppConfig::default(),
    };

    config.apply(Overrides {
        dbc_file: args.dbc,
        signal: args.signal,
        host: args.host,
        port: args.port,
        toggle_key: args.toggle_key,
        quit_key: args.quit_key,
    });
    config.validate()?;

    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    // Explicit \r\n keeps log lines aligned while the terminal is in raw mode
    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            write!(
                buf,
                "[{} {}] {}\r\n",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
