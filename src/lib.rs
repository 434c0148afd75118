//! # Vehicle Tracker Library
//!
//! Keeps a vehicle's LTE link up and streams its GPS position to a Traccar
//! server.
//!
//! The modem (SIM7600 family) exposes both the cellular data link and the GNSS
//! engine; the GNSS engine is driven over the modem's AT command port.

pub mod config;
pub mod error;
pub mod gps;
pub mod modem;
pub mod network;
pub mod serial;
pub mod status;
pub mod supervisor;
pub mod telemetry;
