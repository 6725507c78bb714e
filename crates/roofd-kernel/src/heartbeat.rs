//! [`Heartbeat`] – the deadman switch bookkeeping.
//!
//! A client arms the heartbeat with a timeout and must refresh it before the
//! deadline passes.  When the deadline is missed the heartbeat becomes
//! [`HeartbeatState::TimedOut`] and the background
//! [`Watchdog`][crate::watchdog::Watchdog] drives a forced close.
//!
//! This type only records state and deadlines; the timer task lives in
//! [`crate::watchdog`] and all mutation happens under the controller's lock.

use std::time::Duration;

use roofd_types::{CommandStatus, HeartbeatState};
use tokio::time::Instant;

/// Exclusive upper bound of a heartbeat timeout.
pub const MAX_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(240);

/// Validate a client-supplied timeout in seconds.
///
/// Accepts values strictly between 0 and 240 seconds.
pub fn validate_timeout(seconds: f64) -> Result<Duration, CommandStatus> {
    if !seconds.is_finite() || seconds <= 0.0 || seconds >= MAX_HEARTBEAT_TIMEOUT.as_secs_f64() {
        return Err(CommandStatus::HeartbeatInvalidTimeout);
    }
    Ok(Duration::from_secs_f64(seconds))
}

#[derive(Debug, Clone, Default)]
pub struct Heartbeat {
    state: HeartbeatState,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    /// Set while the forced close triggered by the last expiry is running.
    close_in_progress: bool,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HeartbeatState {
        self.state
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Deadline of the running timer; `None` unless `Active`.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn close_in_progress(&self) -> bool {
        self.close_in_progress
    }

    /// Arm (or re-arm) the timer with `timeout_seconds`.
    ///
    /// # Errors
    ///
    /// - [`CommandStatus::HeartbeatCloseInProgress`] while a forced close runs.
    /// - [`CommandStatus::HeartbeatInvalidTimeout`] outside (0, 240) seconds.
    pub fn enable(&mut self, timeout_seconds: f64, now: Instant) -> Result<(), CommandStatus> {
        if self.close_in_progress {
            return Err(CommandStatus::HeartbeatCloseInProgress);
        }
        let timeout = validate_timeout(timeout_seconds)?;
        self.state = HeartbeatState::Active;
        self.timeout = Some(timeout);
        self.deadline = Some(now + timeout);
        Ok(())
    }

    /// Push the deadline out by the armed timeout.
    ///
    /// # Errors
    ///
    /// [`CommandStatus::HeartbeatTimedOut`] after expiry and
    /// [`CommandStatus::Failed`] when the heartbeat is disabled.
    pub fn refresh(&mut self, now: Instant) -> Result<(), CommandStatus> {
        match (self.state, self.timeout) {
            (HeartbeatState::Active, Some(timeout)) => {
                self.deadline = Some(now + timeout);
                Ok(())
            }
            (HeartbeatState::TimedOut, _) => Err(CommandStatus::HeartbeatTimedOut),
            _ => Err(CommandStatus::Failed),
        }
    }

    /// Stop monitoring.
    ///
    /// # Errors
    ///
    /// [`CommandStatus::HeartbeatCloseInProgress`] while the forced close
    /// triggered by this heartbeat has not finished.
    pub fn disable(&mut self) -> Result<(), CommandStatus> {
        if self.close_in_progress {
            return Err(CommandStatus::HeartbeatCloseInProgress);
        }
        self.state = HeartbeatState::Disabled;
        self.deadline = None;
        Ok(())
    }

    /// Transition `Active → TimedOut` if the deadline has passed.
    ///
    /// Returns `true` when the transition happened; a refresh that raced
    /// ahead of the timer leaves the heartbeat untouched.
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        match (self.state, self.deadline) {
            (HeartbeatState::Active, Some(deadline)) if deadline <= now => {
                self.state = HeartbeatState::TimedOut;
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn begin_forced_close(&mut self) {
        self.close_in_progress = true;
    }

    pub(crate) fn finish_forced_close(&mut self) {
        self.close_in_progress = false;
    }

    /// Time left before expiry; `None` unless `Active`.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}
