//! # Error Types
//!
//! Custom error types for the vehicle tracker using `thiserror`.

use thiserror::Error;

/// Main error type for the vehicle tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Serial port could not be opened, written or read
    #[error("Serial error: {0}")]
    Serial(String),

    /// AT response did not contain the expected token
    #[error("AT command {command} did not answer with {expected:?}")]
    AtMismatch {
        command: String,
        expected: String,
        response: String,
    },

    /// Fix polling exhausted without a satellite lock
    #[error("No GPS fix available after {0} attempts")]
    NoFixAvailable(u32),

    /// Position sentence rejected by the parser
    #[error("Malformed position sentence: {0}")]
    Malformed(String),

    /// Position report could not be delivered
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Internet reachability could not be established
    #[error("Link failure: {0}")]
    LinkFailure(String),

    /// The privileged link-raise command failed
    #[error("Failed to raise cellular link: {0}")]
    LinkRaise(String),

    /// A privileged system command failed
    #[error("System command failed: {0}")]
    Command(String),

    /// Chat notification could not be delivered
    #[error("Notification error: {0}")]
    Notify(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// Logical GPS failures: no lock, bad sentence, or the modem refused a command.
    pub fn is_gps_failure(&self) -> bool {
        matches!(
            self,
            TrackerError::NoFixAvailable(_)
                | TrackerError::Malformed(_)
                | TrackerError::AtMismatch { .. }
        )
    }

    /// Serial-level faults that abort the current cycle.
    pub fn is_transport(&self) -> bool {
        matches!(self, TrackerError::Serial(_) | TrackerError::Io(_))
    }

    /// Faults that end the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TrackerError::LinkRaise(_))
    }
}

/// Result type alias for the vehicle tracker
pub type Result<T> = std::result::Result<T, TrackerError>;
