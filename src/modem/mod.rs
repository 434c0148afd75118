//! # Modem Module
//!
//! AT command request/response handling over the modem's serial port.

pub mod at;

pub use at::{AtTransport, AtTiming};
