//! # Supervisor Module
//!
//! Top-level orchestration of link bring-up, GPS acquisition and upload.
//!
//! ## Control Flow
//!
//! 1. **Outer loop** (until a fatal error)
//!    - Bring up the link through the [`LinkManager`]
//!    - Emit the startup event (once per process)
//!    - Open the modem's AT port; it lives until the inner loop is left
//!    - Any escalation: drop the port, report all-down, cool down, start over
//!    - Link-raise failure: stop and hand the error to the caller
//!
//! 2. **Inner loop** (while the link is established)
//!    - Ensure the GPS engine runs, poll a fix, upload it
//!    - Fold the outcome into [`InnerLoopState`] (see [`state`])
//!    - Report (network, GPS) edges, then sleep until the next cycle

pub mod state;

use std::convert::Infallible;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::gps::{Fix, GpsSession, SessionSettings};
use crate::modem::{AtTiming, AtTransport};
use crate::network::LinkManager;
use crate::serial::PortOpener;
use crate::status::{LinkStatus, StatusReporter};
use crate::telemetry::Uploader;
use state::{CycleEffects, CycleOutcome, InnerLoopState, Phase, StatusTracker};

/// Timings and thresholds of the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub at: AtTiming,
    pub session: SessionSettings,
    /// Sleep between two inner-loop cycles
    pub cycle_interval: Duration,
    /// Sleep after a cycle that ended in a transport error
    pub transport_retry: Duration,
    /// Sleep before the outer loop starts over
    pub restart_cooldown: Duration,
    pub failure_threshold: u32,
    /// 0 disables escalation of consecutive transport errors
    pub max_transport_errors: u32,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            at: AtTiming::default(),
            session: SessionSettings::default(),
            cycle_interval: Duration::from_secs(3),
            transport_retry: Duration::from_secs(3),
            restart_cooldown: Duration::from_secs(60),
            failure_threshold: 20,
            max_transport_errors: 0,
        }
    }
}

impl From<&Config> for SupervisorSettings {
    fn from(config: &Config) -> Self {
        Self {
            at: AtTiming {
                timeout: config.serial.command_timeout(),
                settle: config.serial.settle_delay(),
            },
            session: SessionSettings::from(&config.gps),
            cycle_interval: config.device.report_interval(),
            transport_retry: Duration::from_secs(config.supervisor.transport_retry_s),
            restart_cooldown: Duration::from_secs(config.supervisor.restart_cooldown_s),
            failure_threshold: config.gps.failure_threshold,
            max_transport_errors: config.supervisor.max_consecutive_transport_errors,
        }
    }
}

/// Connectivity-and-telemetry supervisor
pub struct Supervisor {
    link: Box<dyn LinkManager>,
    opener: Box<dyn PortOpener>,
    uploader: Box<dyn Uploader>,
    reporter: Box<dyn StatusReporter>,
    settings: SupervisorSettings,
    tracker: StatusTracker,
    startup_sent: bool,
    phase: Phase,
}

impl Supervisor {
    pub fn new(
        link: impl LinkManager + 'static,
        opener: impl PortOpener + 'static,
        uploader: impl Uploader + 'static,
        reporter: impl StatusReporter + 'static,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            link: Box::new(link),
            opener: Box::new(opener),
            uploader: Box::new(uploader),
            reporter: Box::new(reporter),
            settings,
            tracker: StatusTracker::new(),
            startup_sent: false,
            phase: Phase::BringingUpLink,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the outer loop
    ///
    /// Only returns on a fatal error (the link-raise command failed); every
    /// other failure is retried after the restart cool-down.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let cause = match self.run_link_session().await {
                Ok(never) => match never {},
                Err(e) => e,
            };

            if cause.is_fatal() {
                error!("Unrecoverable error, giving up: {}", cause);
                self.phase = Phase::Halted;
                return Err(cause);
            }

            self.cool_down(&cause).await;
        }
    }

    /// One outer-loop iteration; the AT port is dropped when this returns
    async fn run_link_session(&mut self) -> Result<Infallible> {
        self.phase = Phase::BringingUpLink;
        self.link.bring_up_link().await?;
        self.report(LinkStatus::new(true, false)).await;

        if !self.startup_sent {
            self.reporter.started().await;
            self.startup_sent = true;
        }

        info!("Starting GPS data collection...");
        let port = self.opener.open().await.map_err(|e| {
            error!("Failed to initialize serial port: {}", e);
            e
        })?;
        let mut session = GpsSession::new(AtTransport::new(port, self.settings.at), self.settings.session);
        let mut inner = InnerLoopState::new(
            self.settings.failure_threshold,
            self.settings.max_transport_errors,
        );

        self.phase = Phase::Acquiring;
        loop {
            let (outcome, effects) = self.run_cycle(&mut session, &mut inner).await;

            if effects.escalate {
                return Err(TrackerError::Serial(format!(
                    "{} consecutive transport errors",
                    inner.transport_streak()
                )));
            }

            if outcome == CycleOutcome::TransportError {
                sleep(self.settings.transport_retry).await;
            } else {
                debug!("Waiting for {:?} before next reading...", self.settings.cycle_interval);
                sleep(self.settings.cycle_interval).await;
            }
        }
    }

    /// One inner-loop cycle: acquire, upload, update counters and status
    pub async fn run_cycle(
        &mut self,
        session: &mut GpsSession,
        inner: &mut InnerLoopState,
    ) -> (CycleOutcome, CycleEffects) {
        let outcome = match acquire(session).await {
            Ok(fix) => self.deliver(&fix).await,
            Err(e) if e.is_transport() => {
                error!("Error in GPS data collection: {}", e);
                CycleOutcome::TransportError
            }
            Err(e) => {
                warn!("No valid GPS data received: {}", e);
                CycleOutcome::NoFix
            }
        };

        let effects = inner.apply(outcome);
        self.report(LinkStatus::new(true, inner.gps_up())).await;

        if effects.persistent_failure {
            warn!("Persistent GPS failure, continuing to retry indefinitely.");
        }

        (outcome, effects)
    }

    async fn deliver(&mut self, fix: &Fix) -> CycleOutcome {
        debug!("\n{}", fix);
        match serde_json::to_string(fix) {
            Ok(json) => info!("GPS Data: {}", json),
            Err(e) => warn!("Failed to serialize fix: {}", e),
        }

        match self.uploader.upload(fix).await {
            Ok(()) => {
                info!("Data sent successfully to Traccar server");
                CycleOutcome::Uploaded
            }
            Err(e) => {
                error!("Failed to send data to Traccar server: {}", e);
                CycleOutcome::UploadFailed
            }
        }
    }

    /// Notify the reporter only when the pair changed
    async fn report(&mut self, status: LinkStatus) {
        if let Some(changed) = self.tracker.observe(status) {
            self.reporter.status_changed(changed).await;
        }
    }

    async fn cool_down(&mut self, cause: &TrackerError) {
        self.phase = Phase::CoolingDown;
        error!("An error occurred in the main loop: {}", cause);
        info!(
            "Restarting the entire process in {} seconds...",
            self.settings.restart_cooldown.as_secs()
        );

        self.tracker.force(LinkStatus::DOWN);
        self.reporter.status_changed(LinkStatus::DOWN).await;

        sleep(self.settings.restart_cooldown).await;
    }
}

async fn acquire(session: &mut GpsSession) -> Result<Fix> {
    session.ensure_started().await?;
    session.poll_fix().await
}
