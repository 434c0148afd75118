//! # GPS Session
//!
//! Lifecycle of the modem's GPS engine on top of the AT transport.
//!
//! ## State Machine
//!
//! ```text
//! Unknown/Stopped/Faulted --ensure_started--> AT+CGPS? reports running --> AwaitingFix
//!                                          \-> AT+CGPS=1 OK --warm-up--> AwaitingFix
//!                                          \-> AT+CGPS=1 refused -------> Faulted
//! AwaitingFix --poll_fix serial fault--> Faulted
//! ```

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::fix::{extract_payload, is_empty_sentence, parse_fix, Fix};
use crate::config::GpsConfig;
use crate::error::{Result, TrackerError};
use crate::modem::AtTransport;

/// Query whether the GPS engine is running
pub const CMD_GPS_STATUS: &str = "AT+CGPS?";
/// Start the GPS engine
pub const CMD_GPS_START: &str = "AT+CGPS=1";
/// Query the current position
pub const CMD_GPS_INFO: &str = "AT+CGPSINFO";

const STATUS_PREFIX: &str = "+CGPS: ";
const STATUS_RUNNING: &str = "+CGPS: 1";
const INFO_PREFIX: &str = "+CGPSINFO: ";

/// Lifecycle state of the modem's GPS engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Stopped,
    Starting,
    AwaitingFix,
    Faulted,
}

/// Timings and bounds of a GPS session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub warmup: Duration,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(2),
            poll_attempts: 10,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl From<&GpsConfig> for SessionSettings {
    fn from(config: &GpsConfig) -> Self {
        Self {
            warmup: Duration::from_millis(config.warmup_ms),
            poll_attempts: config.poll_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// GPS session owning the modem transport for one outer-loop iteration
pub struct GpsSession {
    transport: AtTransport,
    settings: SessionSettings,
    state: SessionState,
}

impl GpsSession {
    pub fn new(transport: AtTransport, settings: SessionSettings) -> Self {
        Self {
            transport,
            settings,
            state: SessionState::Unknown,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Make sure the GPS engine is running
    ///
    /// The start command is only issued when the status query does not report
    /// a running engine, since restarting an active session resets it.
    ///
    /// # Errors
    ///
    /// - `AtMismatch` when the modem refuses the start command (state becomes `Faulted`)
    /// - `Serial` on port failure (state becomes `Faulted`)
    pub async fn ensure_started(&mut self) -> Result<()> {
        info!("Start GPS session...");

        match self.transport.send(CMD_GPS_STATUS, STATUS_PREFIX).await {
            Ok(answer) if answer.contains(STATUS_RUNNING) => {
                info!("GPS already running.");
                self.state = SessionState::AwaitingFix;
                return Ok(());
            }
            Ok(_) | Err(TrackerError::AtMismatch { .. }) => {
                self.state = SessionState::Stopped;
            }
            Err(e) => {
                self.state = SessionState::Faulted;
                return Err(e);
            }
        }

        self.state = SessionState::Starting;
        if let Err(e) = self.transport.send(CMD_GPS_START, "OK").await {
            error!("Failed to start GPS: {}", e);
            self.state = SessionState::Faulted;
            return Err(e);
        }

        // Give the engine time to initialize before the first query
        sleep(self.settings.warmup).await;
        self.state = SessionState::AwaitingFix;
        Ok(())
    }

    /// Poll for a position fix
    ///
    /// Refused queries and answers without a satellite lock use up an attempt;
    /// the first answer with data is parsed and returned as-is.
    ///
    /// # Errors
    ///
    /// - `NoFixAvailable` when every attempt is used up
    /// - `Malformed` when the first non-empty answer cannot be parsed
    /// - `Serial` on port failure (state becomes `Faulted`)
    pub async fn poll_fix(&mut self) -> Result<Fix> {
        let attempts = self.settings.poll_attempts;

        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(self.settings.poll_interval).await;
            }

            let answer = match self.transport.send(CMD_GPS_INFO, INFO_PREFIX).await {
                Ok(answer) => answer,
                Err(TrackerError::AtMismatch { .. }) => {
                    error!("Failed to send {} command", CMD_GPS_INFO);
                    continue;
                }
                Err(e) => {
                    self.state = SessionState::Faulted;
                    return Err(e);
                }
            };

            match extract_payload(&answer, INFO_PREFIX) {
                Some(sentence) if !is_empty_sentence(sentence) => {
                    info!("GPS Position: {}", sentence);
                    return parse_fix(sentence);
                }
                _ => warn!("GPS is not ready"),
            }
        }

        error!("Failed to get valid GPS data after {} attempts", attempts);
        Err(TrackerError::NoFixAvailable(attempts))
    }
}
