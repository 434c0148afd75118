//! Link bring-up sequence
//!
//! 1. Stop the conflicting modem daemon (failure is logged, not fatal)
//! 2. Raise the LTE link (failure is fatal to the process)
//! 3. Probe reachability every `interval`, at most `attempts` times
//! 4. Restart the tunnel service (failure is logged, not fatal)

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::probe::ReachabilityProbe;
use super::system::SystemControl;
use crate::config::NetworkConfig;
use crate::error::{Result, TrackerError};

/// Anything able to establish the cellular link
#[async_trait]
pub trait LinkManager: Send {
    /// Establish the link and verify internet reachability
    ///
    /// # Returns
    ///
    /// `Ok(())` once the internet answered; the tunnel restart outcome does not
    /// affect the result
    ///
    /// # Errors
    ///
    /// - `LinkRaise` when the link command fails (unrecoverable)
    /// - `LinkFailure` when reachability cannot be verified in time
    async fn bring_up_link(&mut self) -> Result<()>;
}

/// How often and how long to wait for reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSchedule {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ProbeSchedule {
    fn default() -> Self {
        Self {
            attempts: 12,
            interval: Duration::from_secs(5),
        }
    }
}

impl From<&NetworkConfig> for ProbeSchedule {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            attempts: config.probe_attempts,
            interval: Duration::from_secs(config.probe_interval_s),
        }
    }
}

/// Brings up the cellular link through OS operations and a reachability probe
pub struct ConnectivityManager<S, P> {
    system: S,
    probe: P,
    schedule: ProbeSchedule,
}

impl<S: SystemControl, P: ReachabilityProbe> ConnectivityManager<S, P> {
    pub fn new(system: S, probe: P, schedule: ProbeSchedule) -> Self {
        Self {
            system,
            probe,
            schedule,
        }
    }

    /// Probe until reachable; the attempt budget includes the last try
    async fn wait_for_internet(&self) -> Result<u32> {
        for attempt in 1..=self.schedule.attempts {
            if self.probe.check().await {
                return Ok(attempt);
            }
            info!("Waiting for internet connection... (Attempt {})", attempt);
            if attempt < self.schedule.attempts {
                sleep(self.schedule.interval).await;
            }
        }

        Err(TrackerError::LinkFailure(format!(
            "Failed to establish internet connection after {} attempts",
            self.schedule.attempts
        )))
    }
}

#[async_trait]
impl<S: SystemControl, P: ReachabilityProbe> LinkManager for ConnectivityManager<S, P> {
    async fn bring_up_link(&mut self) -> Result<()> {
        if let Err(e) = self.system.stop_conflicting_service().await {
            warn!("Failed to stop conflicting service: {}", e);
        }

        info!("Starting LTE connection...");
        if let Err(e) = self.system.raise_link().await {
            error!("Failed to start LTE connection: {}", e);
            return Err(match e {
                TrackerError::LinkRaise(_) => e,
                other => TrackerError::LinkRaise(other.to_string()),
            });
        }

        let attempt = self.wait_for_internet().await?;
        info!(
            "Internet connection established (attempt {}). Restarting tunnel service...",
            attempt
        );

        if let Err(e) = self.system.restart_tunnel().await {
            error!("Failed to restart tunnel service: {}", e);
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::ScriptedProbe;
    use super::*;
    use crate::network::system::MockSystemControl;
    use tokio::time::Instant;

    fn healthy_system() -> MockSystemControl {
        let mut system = MockSystemControl::new();
        system.expect_stop_conflicting_service().times(1).returning(|| Ok(()));
        system.expect_raise_link().times(1).returning(|| Ok(()));
        system.expect_restart_tunnel().times(1).returning(|| Ok(()));
        system
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_reachability() {
        let probe = ScriptedProbe::new(&[true]);
        let mut manager = ConnectivityManager::new(healthy_system(), probe.clone(), ProbeSchedule::default());

        tokio_test::assert_ok!(manager.bring_up_link().await);
        assert_eq!(probe.checks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_last_attempt() {
        let probe = ScriptedProbe::failing_then_ok(11);
        let mut manager = ConnectivityManager::new(healthy_system(), probe.clone(), ProbeSchedule::default());

        let start = Instant::now();
        tokio_test::assert_ok!(manager.bring_up_link().await);

        assert_eq!(probe.checks(), 12);
        assert_eq!(start.elapsed(), Duration::from_secs(55));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_probe_budget_is_link_failure() {
        let probe = ScriptedProbe::failing_then_ok(13);
        let mut system = MockSystemControl::new();
        system.expect_stop_conflicting_service().returning(|| Ok(()));
        system.expect_raise_link().returning(|| Ok(()));
        system.expect_restart_tunnel().times(0);
        let mut manager = ConnectivityManager::new(system, probe.clone(), ProbeSchedule::default());

        let err = manager.bring_up_link().await.unwrap_err();

        assert!(matches!(err, TrackerError::LinkFailure(_)));
        assert!(!err.is_fatal());
        assert_eq!(probe.checks(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_raise_failure_is_fatal_and_skips_probe() {
        let probe = ScriptedProbe::new(&[true]);
        let mut system = MockSystemControl::new();
        system.expect_stop_conflicting_service().returning(|| Ok(()));
        system
            .expect_raise_link()
            .returning(|| Err(TrackerError::Command("start-lte: exit status: 1".into())));
        system.expect_restart_tunnel().times(0);
        let mut manager = ConnectivityManager::new(system, probe.clone(), ProbeSchedule::default());

        let err = manager.bring_up_link().await.unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(probe.checks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_service_failure_is_not_fatal() {
        let mut system = MockSystemControl::new();
        system
            .expect_stop_conflicting_service()
            .returning(|| Err(TrackerError::Command("unit not loaded".into())));
        system.expect_raise_link().times(1).returning(|| Ok(()));
        system.expect_restart_tunnel().returning(|| Ok(()));
        let mut manager = ConnectivityManager::new(system, ScriptedProbe::new(&[true]), ProbeSchedule::default());

        tokio_test::assert_ok!(manager.bring_up_link().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tunnel_restart_failure_is_not_fatal() {
        let mut system = MockSystemControl::new();
        system.expect_stop_conflicting_service().returning(|| Ok(()));
        system.expect_raise_link().returning(|| Ok(()));
        system
            .expect_restart_tunnel()
            .times(1)
            .returning(|| Err(TrackerError::Command("tailscaled: exit status: 1".into())));
        let mut manager = ConnectivityManager::new(system, ScriptedProbe::new(&[true]), ProbeSchedule::default());

        tokio_test::assert_ok!(manager.bring_up_link().await);
    }

    #[test]
    fn test_schedule_from_config() {
        assert_eq!(ProbeSchedule::from(&NetworkConfig::default()), ProbeSchedule::default());
    }
}
