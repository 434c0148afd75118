//! Supervisor bookkeeping, kept free of I/O and timing
//!
//! ## Inner-loop transition table
//!
//! | Outcome          | gps_up    | GPS failure counter      | transport streak |
//! |------------------|-----------|--------------------------|------------------|
//! | `Uploaded`       | true      | reset                    | reset            |
//! | `UploadFailed`   | true      | reset, then +1           | reset            |
//! | `NoFix`          | false     | +1                       | reset            |
//! | `TransportError` | unchanged | unchanged                | +1               |
//!
//! Reaching the failure threshold logs a persistent-failure warning and resets
//! the counter; it never leaves the inner loop. Only a transport streak at the
//! configured limit (when enabled) escalates to the outer loop.

use crate::status::LinkStatus;

/// Where the supervisor currently is in its outer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BringingUpLink,
    Acquiring,
    CoolingDown,
    Halted,
}

/// Result of one acquisition-and-upload cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fix obtained and delivered
    Uploaded,
    /// Fix obtained, delivery failed
    UploadFailed,
    /// No lock, malformed sentence or GPS engine refused to start
    NoFix,
    /// Serial fault during the cycle
    TransportError,
}

/// What the caller has to act on after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleEffects {
    /// The failure counter hit its threshold and was reset
    pub persistent_failure: bool,
    /// Too many consecutive transport errors; leave the inner loop
    pub escalate: bool,
}

/// Consecutive-failure counter that wraps to zero at its threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCounter {
    count: u32,
    threshold: u32,
}

impl FailureCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Count one failure; true when the threshold was reached (counter is reset)
    pub fn record_failure(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.threshold {
            self.count = 0;
            return true;
        }
        false
    }
}

/// Edge detector for the (network, GPS) pair
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    last: Option<LinkStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<LinkStatus> {
        self.last
    }

    /// Record `status`; returns it only if it differs from the previous one
    pub fn observe(&mut self, status: LinkStatus) -> Option<LinkStatus> {
        if self.last == Some(status) {
            return None;
        }
        self.last = Some(status);
        Some(status)
    }

    /// Overwrite the last-known status without edge detection
    pub fn force(&mut self, status: LinkStatus) {
        self.last = Some(status);
    }
}

/// Counters of one inner-loop run; rebuilt on every outer-loop iteration
#[derive(Debug, Clone)]
pub struct InnerLoopState {
    gps_failures: FailureCounter,
    transport_streak: u32,
    max_transport_errors: u32,
    gps_up: bool,
}

impl InnerLoopState {
    /// `max_transport_errors == 0` disables escalation
    pub fn new(failure_threshold: u32, max_transport_errors: u32) -> Self {
        Self {
            gps_failures: FailureCounter::new(failure_threshold),
            transport_streak: 0,
            max_transport_errors,
            gps_up: false,
        }
    }

    pub fn gps_up(&self) -> bool {
        self.gps_up
    }

    pub fn gps_failures(&self) -> u32 {
        self.gps_failures.count()
    }

    pub fn transport_streak(&self) -> u32 {
        self.transport_streak
    }

    /// Apply one cycle outcome (see the module table)
    pub fn apply(&mut self, outcome: CycleOutcome) -> CycleEffects {
        let mut effects = CycleEffects::default();

        match outcome {
            CycleOutcome::Uploaded => {
                self.transport_streak = 0;
                self.gps_up = true;
                self.gps_failures.reset();
            }
            CycleOutcome::UploadFailed => {
                self.transport_streak = 0;
                self.gps_up = true;
                self.gps_failures.reset();
                effects.persistent_failure = self.gps_failures.record_failure();
            }
            CycleOutcome::NoFix => {
                self.transport_streak = 0;
                self.gps_up = false;
                effects.persistent_failure = self.gps_failures.record_failure();
            }
            CycleOutcome::TransportError => {
                self.transport_streak = self.transport_streak.saturating_add(1);
                effects.escalate = self.max_transport_errors > 0
                    && self.transport_streak >= self.max_transport_errors;
            }
        }

        effects
    }
}
