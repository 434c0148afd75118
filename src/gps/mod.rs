//! # GPS Module
//!
//! Position acquisition from the modem's built-in GNSS receiver.
//!
//! This module handles:
//! - Starting the GPS engine only when it is not already running
//! - Polling `AT+CGPSINFO` until the receiver has a lock
//! - Parsing the position sentence into a [`fix::Fix`]

pub mod fix;
pub mod session;

pub use fix::{parse_fix, Fix};
pub use session::{GpsSession, SessionSettings, SessionState};
