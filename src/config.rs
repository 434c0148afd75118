//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TrackerError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub gps: GpsConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Device identity
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Unique id the tracking server knows this vehicle by
    pub id: String,

    /// Pause between two acquisition cycles
    #[serde(default = "default_report_interval_s")]
    pub report_interval_s: u64,
}

/// Serial port configuration for the modem's AT port
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// GPS session configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GpsConfig {
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

/// Link bring-up configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    #[serde(default = "default_probe_timeout_s")]
    pub probe_timeout_s: u64,

    #[serde(default = "default_probe_interval_s")]
    pub probe_interval_s: u64,

    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,

    #[serde(default = "default_conflicting_service")]
    pub conflicting_service: String,

    #[serde(default = "default_link_command")]
    pub link_command: Vec<String>,

    #[serde(default = "default_tunnel_service")]
    pub tunnel_service: String,
}

/// Tracking server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub url: String,

    #[serde(default = "default_server_timeout_s")]
    pub timeout_s: u64,
}

/// Restart and backoff timings of the supervisor
#[derive(Debug, Deserialize, Clone)]
pub struct SupervisorConfig {
    #[serde(default = "default_restart_cooldown_s")]
    pub restart_cooldown_s: u64,

    #[serde(default = "default_transport_retry_s")]
    pub transport_retry_s: u64,

    /// 0 disables escalation of repeated serial faults
    #[serde(default)]
    pub max_consecutive_transport_errors: u32,
}

/// Chat notification configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub chat_id: String,

    #[serde(default = "default_startup_message")]
    pub startup_message: String,

    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    #[serde(default)]
    pub status_updates: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_report_interval_s() -> u64 { 3 }

fn default_serial_port() -> String { "/dev/ttyUSB2".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_command_timeout_ms() -> u64 { 1000 }
fn default_settle_ms() -> u64 { 10 }

fn default_warmup_ms() -> u64 { 2000 }
fn default_poll_attempts() -> u32 { 10 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_failure_threshold() -> u32 { 20 }

fn default_probe_url() -> String { "http://www.google.com".to_string() }
fn default_probe_timeout_s() -> u64 { 5 }
fn default_probe_interval_s() -> u64 { 5 }
fn default_probe_attempts() -> u32 { 12 }
fn default_use_sudo() -> bool { true }
fn default_conflicting_service() -> String { "ModemManager".to_string() }
fn default_link_command() -> Vec<String> { vec!["/usr/local/bin/start-lte".to_string()] }
fn default_tunnel_service() -> String { "tailscaled".to_string() }

fn default_server_timeout_s() -> u64 { 10 }

fn default_restart_cooldown_s() -> u64 { 60 }
fn default_transport_retry_s() -> u64 { 3 }

fn default_api_base() -> String { "https://api.telegram.org".to_string() }
fn default_startup_message() -> String { "Vehicle tracker started...".to_string() }
fn default_utc_offset_minutes() -> i32 { 330 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            command_timeout_ms: default_command_timeout_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            warmup_ms: default_warmup_ms(),
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            probe_timeout_s: default_probe_timeout_s(),
            probe_interval_s: default_probe_interval_s(),
            probe_attempts: default_probe_attempts(),
            use_sudo: default_use_sudo(),
            conflicting_service: default_conflicting_service(),
            link_command: default_link_command(),
            tunnel_service: default_tunnel_service(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_cooldown_s: default_restart_cooldown_s(),
            transport_retry_s: default_transport_retry_s(),
            max_consecutive_transport_errors: 0,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_api_base(),
            bot_token: String::new(),
            chat_id: String::new(),
            startup_message: default_startup_message(),
            utc_offset_minutes: default_utc_offset_minutes(),
            status_updates: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl DeviceConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_s)
    }
}

impl SerialConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> TrackerError {
    TrackerError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vehicle_tracker::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.device.id.trim().is_empty() {
            return Err(invalid("device id cannot be empty"));
        }

        if self.device.report_interval_s == 0 || self.device.report_interval_s > 3600 {
            return Err(invalid("report_interval_s must be between 1 and 3600"));
        }

        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600]
            .contains(&self.serial.baud_rate)
        {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        if self.serial.command_timeout_ms == 0 || self.serial.command_timeout_ms > 10000 {
            return Err(invalid("command_timeout_ms must be between 1 and 10000"));
        }

        if self.serial.settle_ms > 1000 {
            return Err(invalid("settle_ms must be at most 1000"));
        }

        if self.gps.poll_attempts == 0 {
            return Err(invalid("poll_attempts must be greater than 0"));
        }

        if self.gps.failure_threshold == 0 {
            return Err(invalid("failure_threshold must be greater than 0"));
        }

        if self.network.probe_attempts == 0 {
            return Err(invalid("probe_attempts must be greater than 0"));
        }

        if self.network.probe_timeout_s == 0 || self.network.probe_timeout_s > 60 {
            return Err(invalid("probe_timeout_s must be between 1 and 60"));
        }

        if self.network.link_command.is_empty() || self.network.link_command[0].is_empty() {
            return Err(invalid("link_command cannot be empty"));
        }

        if !is_http_url(&self.network.probe_url) {
            return Err(invalid("probe_url must be an http(s) URL"));
        }

        if !is_http_url(&self.server.url) {
            return Err(invalid("server url must be an http(s) URL"));
        }

        if self.server.timeout_s == 0 || self.server.timeout_s > 120 {
            return Err(invalid("server timeout_s must be between 1 and 120"));
        }

        if self.supervisor.restart_cooldown_s == 0 {
            return Err(invalid("restart_cooldown_s must be greater than 0"));
        }

        if self.notify.enabled {
            if self.notify.bot_token.is_empty() || self.notify.chat_id.is_empty() {
                return Err(invalid("bot_token and chat_id are required when notify is enabled"));
            }
            if !is_http_url(&self.notify.api_base) {
                return Err(invalid("notify api_base must be an http(s) URL"));
            }
        }

        // Offsets beyond +/-14h do not exist
        if !(-840..=840).contains(&self.notify.utc_offset_minutes) {
            return Err(invalid("utc_offset_minutes must be between -840 and 840"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
