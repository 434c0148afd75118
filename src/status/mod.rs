//! # Status Module
//!
//! Consumers of the supervisor's (network, GPS) state.
//!
//! This module handles:
//! - The [`LinkStatus`] pair and the [`StatusReporter`] trait
//! - A two-line status display rendered to the log
//! - A chat notifier for the startup message and optional status updates
//! - Fanning one event out to several reporters

pub mod chat;
pub mod display;

use async_trait::async_trait;

pub use chat::ChatNotifier;
pub use display::DisplayReporter;

/// Network and GPS availability as last observed by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub network_up: bool,
    pub gps_up: bool,
}

impl LinkStatus {
    pub const DOWN: LinkStatus = LinkStatus {
        network_up: false,
        gps_up: false,
    };

    pub fn new(network_up: bool, gps_up: bool) -> Self {
        Self { network_up, gps_up }
    }
}

/// Consumer of status edges and the one-shot startup event
///
/// Reporters are fire-and-forget: failures are logged by the reporter and
/// never reach the supervisor.
#[async_trait]
pub trait StatusReporter: Send {
    /// Called when the (network, GPS) pair changes
    async fn status_changed(&mut self, status: LinkStatus);

    /// Called once per process, after the first successful link bring-up
    async fn started(&mut self);
}

/// Forwards every event to each wrapped reporter in order
#[derive(Default)]
pub struct MultiReporter {
    reporters: Vec<Box<dyn StatusReporter>>,
}

impl MultiReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: impl StatusReporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

#[async_trait]
impl StatusReporter for MultiReporter {
    async fn status_changed(&mut self, status: LinkStatus) {
        for reporter in &mut self.reporters {
            reporter.status_changed(status).await;
        }
    }

    async fn started(&mut self) {
        for reporter in &mut self.reporters {
            reporter.started().await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::RecordingReporter;
    use super::*;

    #[test]
    fn test_down_constant() {
        assert_eq!(LinkStatus::DOWN, LinkStatus::new(false, false));
        assert_eq!(LinkStatus::default(), LinkStatus::DOWN);
    }

    #[tokio::test]
    async fn test_multi_reporter_fans_out() {
        let first = RecordingReporter::new();
        let second = RecordingReporter::new();
        let mut multi = MultiReporter::new().with(first.clone()).with(second.clone());

        multi.started().await;
        multi.status_changed(LinkStatus::new(true, false)).await;

        assert_eq!(multi.len(), 2);
        for reporter in [&first, &second] {
            assert_eq!(reporter.startups(), 1);
            assert_eq!(reporter.statuses(), vec![LinkStatus::new(true, false)]);
        }
    }

    #[tokio::test]
    async fn test_empty_multi_reporter() {
        let mut multi = MultiReporter::new();
        multi.started().await;
        assert!(multi.is_empty());
    }
}
