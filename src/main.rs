//! # Vehicle Tracker
//!
//! Telemetry agent for a vehicle with a SIM7600-family LTE/GNSS modem.
//!
//! Brings the cellular link up, polls the modem's GPS engine over its AT port
//! and reports every fix to a Traccar server.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use vehicle_tracker::config::{Config, LoggingConfig};
use vehicle_tracker::network::{ConnectivityManager, HttpProbe, ProbeSchedule, SystemCommands};
use vehicle_tracker::serial::ModemSerial;
use vehicle_tracker::status::{ChatNotifier, DisplayReporter, MultiReporter};
use vehicle_tracker::supervisor::{Supervisor, SupervisorSettings};
use vehicle_tracker::telemetry::TraccarUploader;

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(version, about = "Vehicle GPS tracker reporting to a Traccar server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Set up console logging, plus a plain-text file when configured
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must stay alive for the file writer to flush.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Main entry point for the vehicle tracker
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse the command line and load the configuration
///    - Set up logging
///    - Wire the link manager, AT port opener, uploader and status reporters
///
/// 2. **Supervision**
///    - Run the supervisor until a fatal error or Ctrl+C
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be read or is invalid
/// - The link-raise command fails (the process exits nonzero)
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Vehicle Tracker v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Device id: {}, server: {}", config.device.id, config.server.url);

    let link = ConnectivityManager::new(
        SystemCommands::new(&config.network),
        HttpProbe::new(
            config.network.probe_url.clone(),
            Duration::from_secs(config.network.probe_timeout_s),
        )?,
        ProbeSchedule::from(&config.network),
    );
    let opener = ModemSerial::new(config.serial.port.clone(), config.serial.baud_rate);
    let uploader = TraccarUploader::new(&config.server, &config.device)?;

    let mut reporters = MultiReporter::new().with(DisplayReporter::new());
    if config.notify.enabled {
        reporters = reporters.with(ChatNotifier::new(&config.notify)?);
    }

    let mut supervisor = Supervisor::new(
        link,
        opener,
        uploader,
        reporters,
        SupervisorSettings::from(&config),
    );

    tokio::select! {
        result = supervisor.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
