//! # Network Module
//!
//! Cellular link bring-up, independent of GPS.
//!
//! This module handles:
//! - Privileged OS operations (stop the conflicting modem daemon, raise LTE,
//!   restart the tunnel service)
//! - The internet reachability probe
//! - Sequencing both in [`ConnectivityManager::bring_up_link`]

pub mod manager;
pub mod probe;
pub mod system;

pub use manager::{ConnectivityManager, LinkManager, ProbeSchedule};
pub use probe::{HttpProbe, ReachabilityProbe};
pub use system::{SystemCommands, SystemControl};
