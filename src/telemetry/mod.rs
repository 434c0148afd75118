//! # Telemetry Module
//!
//! Delivers position reports to the tracking server.
//!
//! This module handles:
//! - Building an OsmAnd-style report from a [`crate::gps::Fix`]
//! - Sending it as a single best-effort HTTP GET (no retry, no queueing)

pub mod report;
pub mod uploader;

pub use report::PositionReport;
pub use uploader::{TraccarUploader, Uploader};
