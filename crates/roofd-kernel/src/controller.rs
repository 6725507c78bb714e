//! [`RoofController`] – the single serialization point of the daemon.
//!
//! Every command from the network, and the watchdog's forced close, goes
//! through this type.  It owns the roof state machine, the heartbeat, the
//! engineering flag and the motor driver, so the checks performed for a
//! command always see a consistent snapshot.
//!
//! Locking:
//!
//! - `state` is a synchronous mutex that is never held across an `.await`.
//! - `motion` guards the driver's report channel for the whole duration of a
//!   motion.  Client motions take it with `try_lock` and report
//!   [`CommandStatus::Blocked`] if it is busy; the forced close waits for it.
//! - Each in-flight motion carries its own abort [`Notify`], used by `stop`,
//!   by the forced close (to pre-empt a client motion) and by shutdown.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use roofd_hal::{MotionReport, MotionReports, MotorCommand, RoofDriver};
use roofd_types::{Command, CommandStatus, HeartbeatState, Response, RoofState, StatusReport};
use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::access_gate::AccessGate;
use crate::config::DaemonConfig;
use crate::engineering::EngineeringMode;
use crate::heartbeat::Heartbeat;
use crate::roof::{Begin, Motion, RoofMachine};

/// Default time allowed for a full open or close.
pub const DEFAULT_MOTION_TIMEOUT: Duration = Duration::from_secs(120);

struct InFlight {
    abort: Arc<Notify>,
    forced: bool,
}

struct ControlState {
    roof: RoofMachine,
    heartbeat: Heartbeat,
    engineering: EngineeringMode,
    in_flight: Option<InFlight>,
    shutting_down: bool,
}

enum Outcome {
    Report(Option<MotionReport>),
    TimedOut,
    Aborted,
}

/// Owns all mutable daemon state and the motor driver.
pub struct RoofController {
    gate: AccessGate,
    driver: Arc<dyn RoofDriver>,
    state: Mutex<ControlState>,
    motion: tokio::sync::Mutex<MotionReports>,
    open_timeout: Duration,
    close_timeout: Duration,
    rearm: Notify,
    shutdown: watch::Sender<bool>,
}

impl RoofController {
    /// Build a controller around `driver` and its motion-report channel.
    ///
    /// The roof starts `PartiallyOpen` (position unknown) until overridden
    /// with [`with_initial_state`][Self::with_initial_state].
    pub fn new(gate: AccessGate, driver: Arc<dyn RoofDriver>, reports: MotionReports) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            gate,
            driver,
            state: Mutex::new(ControlState {
                roof: RoofMachine::new(RoofState::PartiallyOpen),
                heartbeat: Heartbeat::new(),
                engineering: EngineeringMode::new(),
                in_flight: None,
                shutting_down: false,
            }),
            motion: tokio::sync::Mutex::new(reports),
            open_timeout: DEFAULT_MOTION_TIMEOUT,
            close_timeout: DEFAULT_MOTION_TIMEOUT,
            rearm: Notify::new(),
            shutdown,
        }
    }

    /// Build a controller from a validated daemon configuration.
    pub fn from_config(
        config: &DaemonConfig,
        driver: Arc<dyn RoofDriver>,
        reports: MotionReports,
    ) -> Self {
        Self::new(AccessGate::from_config(config), driver, reports)
            .with_timeouts(config.open_timeout, config.close_timeout)
    }

    pub fn with_timeouts(mut self, open: Duration, close: Duration) -> Self {
        self.open_timeout = open;
        self.close_timeout = close;
        self
    }

    pub fn with_initial_state(self, roof: RoofState) -> Self {
        self.lock().roof = RoofMachine::new(roof);
        self
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Command entry point ─────────────────────────────────────────────────

    /// Handle one command from `origin` and produce its response.
    pub async fn handle(&self, origin: IpAddr, command: Command) -> Response {
        let response = self.dispatch(origin, &command).await;
        let code = response.result.code;
        if code == CommandStatus::Succeeded.code() {
            info!(%origin, command = %command, "command succeeded");
        } else {
            warn!(%origin, command = %command, code, message = %response.result.message, "command refused");
        }
        response
    }

    async fn dispatch(&self, origin: IpAddr, command: &Command) -> Response {
        if let Err(status) = self.gate.check(origin) {
            return status.into();
        }
        let status = match command {
            Command::Open => self.client_motion(command, Motion::Open).await,
            Command::Close => self.client_motion(command, Motion::Close).await,
            Command::Stop => self.stop(command).await,
            Command::HeartbeatEnable { timeout } => self.heartbeat_enable(command, *timeout),
            Command::HeartbeatRefresh => self.heartbeat_refresh(command),
            Command::HeartbeatDisable => self.heartbeat_disable(command),
            Command::EngineeringEnable => self.engineering_enable(command),
            Command::EngineeringDisable => self.engineering_disable(command),
            Command::StatusQuery => match self.status_query(command) {
                Ok(report) => return Response::with_status(report),
                Err(status) => status,
            },
        };
        status.into()
    }

    /// Lock the state and run the checks shared by every command that
    /// passed the access gate.
    ///
    /// The command acts under the returned guard, so a forced close cannot
    /// begin between the checks and the action.
    fn admit(&self, command: &Command) -> Result<MutexGuard<'_, ControlState>, CommandStatus> {
        let state = self.lock();
        if state.shutting_down {
            return Err(CommandStatus::Failed);
        }
        if state.heartbeat.close_in_progress() {
            return match command {
                Command::StatusQuery => Ok(state),
                Command::HeartbeatDisable => Err(CommandStatus::HeartbeatCloseInProgress),
                _ => Err(CommandStatus::HeartbeatTimedOut),
            };
        }
        Ok(state)
    }

    // ── Motions ─────────────────────────────────────────────────────────────

    async fn client_motion(&self, command: &Command, motion: Motion) -> CommandStatus {
        let (mut reports, abort) = {
            let mut state = match self.admit(command) {
                Ok(state) => state,
                Err(status) => return status,
            };
            if let Err(status) = state.engineering.check() {
                return status;
            }
            if motion == Motion::Open && state.heartbeat.state() == HeartbeatState::TimedOut {
                return CommandStatus::HeartbeatTimedOut;
            }
            let Ok(reports) = self.motion.try_lock() else {
                return CommandStatus::Blocked;
            };
            match state.roof.begin(motion) {
                Err(status) => return status,
                Ok(Begin::AlreadyThere) => return CommandStatus::Succeeded,
                Ok(Begin::Started) => {}
            }
            let abort = Arc::new(Notify::new());
            state.in_flight = Some(InFlight {
                abort: Arc::clone(&abort),
                forced: false,
            });
            (reports, abort)
        };
        self.run_motion(motion, &mut reports, &abort).await
    }

    /// Drive the motor for a motion whose transient state is already set,
    /// then resolve the state machine.  The caller holds the motion guard.
    async fn run_motion(
        &self,
        motion: Motion,
        reports: &mut MotionReports,
        abort: &Notify,
    ) -> CommandStatus {
        // Drop reports left over from an earlier, aborted motion.
        while let Ok(stale) = reports.try_recv() {
            debug!(?stale, "discarding stale motion report");
        }

        let outcome = match self.driver.send(motion.motor_command()).await {
            Err(e) => {
                error!(driver = %self.driver.id(), error = %e, ?motion, "motor command failed");
                None
            }
            Ok(()) => {
                let timeout = match motion {
                    Motion::Open => self.open_timeout,
                    Motion::Close => self.close_timeout,
                };
                Some(tokio::select! {
                    report = reports.recv() => Outcome::Report(report),
                    _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
                    _ = abort.notified() => Outcome::Aborted,
                })
            }
        };

        let report = match outcome {
            None => None,
            Some(Outcome::Report(report)) => report,
            Some(Outcome::TimedOut) => {
                warn!(?motion, "motion timed out; stopping motor");
                self.stop_motor().await;
                None
            }
            Some(Outcome::Aborted) => {
                info!(?motion, "motion aborted; stopping motor");
                self.stop_motor().await;
                None
            }
        };

        let reached = {
            let mut state = self.lock();
            let reached = state.roof.finish(motion, report);
            if state.in_flight.take().is_some_and(|m| m.forced) {
                state.heartbeat.finish_forced_close();
            }
            reached
        };
        info!(?motion, roof = %reached, "motion finished");

        if reached == motion.target() {
            CommandStatus::Succeeded
        } else {
            CommandStatus::Failed
        }
    }

    async fn stop_motor(&self) {
        if let Err(e) = self.driver.send(MotorCommand::Stop).await {
            error!(driver = %self.driver.id(), error = %e, "stop command failed");
        }
    }

    async fn stop(&self, command: &Command) -> CommandStatus {
        let _idle = {
            let state = match self.admit(command) {
                Ok(state) => state,
                Err(status) => return status,
            };
            match &state.in_flight {
                Some(motion) if motion.forced => return CommandStatus::HeartbeatTimedOut,
                Some(motion) => {
                    motion.abort.notify_one();
                    return CommandStatus::Succeeded;
                }
                // Holding the motion guard keeps a forced close from starting
                // until the stop has reached the motor.
                None => match self.motion.try_lock() {
                    Ok(guard) => guard,
                    Err(_) => return CommandStatus::Blocked,
                },
            }
        };
        match self.driver.send(MotorCommand::Stop).await {
            Ok(()) => CommandStatus::Succeeded,
            Err(e) => {
                error!(driver = %self.driver.id(), error = %e, "stop command failed");
                CommandStatus::Failed
            }
        }
    }

    // ── Heartbeat and engineering mode ──────────────────────────────────────

    fn heartbeat_enable(&self, command: &Command, timeout: f64) -> CommandStatus {
        let mut state = match self.admit(command) {
            Ok(state) => state,
            Err(status) => return status,
        };
        if let Err(status) = state.engineering.check() {
            return status;
        }
        if let Err(status) = state.heartbeat.enable(timeout, Instant::now()) {
            return status;
        }
        drop(state);
        self.rearm.notify_one();
        CommandStatus::Succeeded
    }

    fn heartbeat_refresh(&self, command: &Command) -> CommandStatus {
        let refreshed = self
            .admit(command)
            .and_then(|mut state| state.heartbeat.refresh(Instant::now()));
        match refreshed {
            Ok(()) => CommandStatus::Succeeded,
            Err(status) => status,
        }
    }

    fn heartbeat_disable(&self, command: &Command) -> CommandStatus {
        let disabled = self
            .admit(command)
            .and_then(|mut state| state.heartbeat.disable());
        if let Err(status) = disabled {
            return status;
        }
        self.rearm.notify_one();
        CommandStatus::Succeeded
    }

    fn engineering_enable(&self, command: &Command) -> CommandStatus {
        let mut state = match self.admit(command) {
            Ok(state) => state,
            Err(status) => return status,
        };
        let heartbeat = state.heartbeat.state();
        match state.engineering.enable(heartbeat) {
            Ok(()) => CommandStatus::Succeeded,
            Err(status) => status,
        }
    }

    fn engineering_disable(&self, command: &Command) -> CommandStatus {
        match self.admit(command) {
            Ok(mut state) => {
                state.engineering.disable();
                CommandStatus::Succeeded
            }
            Err(status) => status,
        }
    }

    fn status_query(&self, command: &Command) -> Result<StatusReport, CommandStatus> {
        self.admit(command).map(|state| report(&state))
    }

    /// Current snapshot of roof, heartbeat and engineering state.
    pub fn status_report(&self) -> StatusReport {
        report(&self.lock())
    }

    // ── Watchdog hooks ──────────────────────────────────────────────────────

    /// Deadline of the armed heartbeat, if any.
    pub fn heartbeat_deadline(&self) -> Option<Instant> {
        self.lock().heartbeat.deadline()
    }

    /// Resolves when the heartbeat has been armed, re-armed or disabled.
    pub async fn rearmed(&self) {
        self.rearm.notified().await;
    }

    /// Expire the heartbeat if its deadline has passed.
    ///
    /// Returns `true` when a forced close must follow: the heartbeat timed
    /// out and the roof is not closed.  In that case the close is marked in
    /// progress and any in-flight client motion is aborted.
    pub fn expire_heartbeat(&self) -> bool {
        let mut state = self.lock();
        if state.shutting_down || !state.heartbeat.expire_if_due(Instant::now()) {
            return false;
        }
        let roof = state.roof.state();
        if roof == RoofState::Closed {
            warn!("heartbeat timed out; roof already closed");
            return false;
        }
        error!(%roof, "heartbeat timed out; closing roof");
        state.heartbeat.begin_forced_close();
        if let Some(motion) = &state.in_flight {
            motion.abort.notify_one();
        }
        true
    }

    /// Close the roof after a heartbeat timeout.
    ///
    /// Waits for any aborted motion to release the motor, then closes.
    /// Failure is logged and not retried.
    pub async fn forced_close(&self) -> CommandStatus {
        let mut reports = self.motion.lock().await;
        let abort = {
            let mut state = self.lock();
            if state.shutting_down {
                state.heartbeat.finish_forced_close();
                return CommandStatus::Failed;
            }
            match state.roof.begin(Motion::Close) {
                Ok(Begin::Started) => {}
                Ok(Begin::AlreadyThere) => {
                    state.heartbeat.finish_forced_close();
                    return CommandStatus::Succeeded;
                }
                Err(status) => {
                    error!(roof = %state.roof.state(), "forced close could not start");
                    state.heartbeat.finish_forced_close();
                    return status;
                }
            }
            let abort = Arc::new(Notify::new());
            state.in_flight = Some(InFlight {
                abort: Arc::clone(&abort),
                forced: true,
            });
            abort
        };

        let status = self.run_motion(Motion::Close, &mut reports, &abort).await;
        if status.is_success() {
            info!("roof closed after heartbeat timeout");
        } else {
            error!(roof = %self.lock().roof.state(), "forced close failed; roof not confirmed closed");
        }
        status
    }

    // ── Shutdown ────────────────────────────────────────────────────────────

    /// Receiver that flips to `true` once [`shutdown`][Self::shutdown] runs.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Refuse further commands, abort any motion and stop the watchdog.
    pub fn shutdown(&self) {
        {
            let mut state = self.lock();
            state.shutting_down = true;
            if let Some(motion) = &state.in_flight {
                motion.abort.notify_one();
            }
        }
        self.shutdown.send_replace(true);
        info!("controller shutting down");
    }
}

fn report(state: &ControlState) -> StatusReport {
    let remaining = state.heartbeat.remaining(Instant::now());
    let date = Utc::now();
    StatusReport {
        date,
        roof: state.roof.state(),
        heartbeat: state.heartbeat.state(),
        heartbeat_until: remaining
            .and_then(|r| chrono::Duration::from_std(r).ok())
            .map(|r| date + r),
        heartbeat_timeout: state.heartbeat.timeout().map(|t| t.as_secs_f64()),
        engineering_mode: state.engineering.is_enabled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roofd_hal::{SimBehaviour, SimRoof};
    use std::net::Ipv4Addr;

    const TCS: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 2, 6, 100));
    const INTRUDER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 2, 6, 99));
    const TRAVEL: Duration = Duration::from_millis(20);

    fn controller(initial: RoofState) -> (Arc<RoofController>, Arc<SimRoof>) {
        let (roof, reports) = SimRoof::new(TRAVEL);
        let roof = Arc::new(roof);
        let driver: Arc<dyn RoofDriver> = roof.clone();
        let controller = RoofController::new(AccessGate::new([TCS]), driver, reports)
            .with_timeouts(Duration::from_millis(500), Duration::from_millis(500))
            .with_initial_state(initial);
        (Arc::new(controller), roof)
    }

    async fn send(controller: &RoofController, command: Command) -> CommandStatus {
        let response = controller.handle(TCS, command).await;
        response.result.status().unwrap()
    }

    #[tokio::test]
    async fn unlisted_origin_changes_nothing() {
        let (controller, roof) = controller(RoofState::Closed);
        for command in [
            Command::Open,
            Command::Close,
            Command::Stop,
            Command::HeartbeatEnable { timeout: 10.0 },
            Command::HeartbeatRefresh,
            Command::HeartbeatDisable,
            Command::EngineeringEnable,
            Command::EngineeringDisable,
            Command::StatusQuery,
        ] {
            let response = controller.handle(INTRUDER, command).await;
            assert_eq!(response.result.status(), Some(CommandStatus::InvalidControlIP));
            assert!(response.status.is_none());
        }
        let report = controller.status_report();
        assert_eq!(report.roof, RoofState::Closed);
        assert_eq!(report.heartbeat, HeartbeatState::Disabled);
        assert!(!report.engineering_mode);
        assert!(roof.commands().is_empty());
    }

    #[tokio::test]
    async fn unlisted_origin_cannot_disarm_or_stop() {
        let (controller, roof) = controller(RoofState::Closed);
        send(&controller, Command::HeartbeatEnable { timeout: 60.0 }).await;
        let open = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.handle(TCS, Command::Open).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        for command in [Command::Stop, Command::HeartbeatDisable, Command::Close] {
            let response = controller.handle(INTRUDER, command).await;
            assert_eq!(response.result.status(), Some(CommandStatus::InvalidControlIP));
        }
        assert!(open.await.unwrap().result.is_success());
        let report = controller.status_report();
        assert_eq!(report.roof, RoofState::Open);
        assert_eq!(report.heartbeat, HeartbeatState::Active);
        assert_eq!(roof.commands(), vec![MotorCommand::Open]);

        send(&controller, Command::HeartbeatDisable).await;
        assert_eq!(send(&controller, Command::EngineeringEnable).await, CommandStatus::Succeeded);
        let response = controller.handle(INTRUDER, Command::EngineeringDisable).await;
        assert_eq!(response.result.status(), Some(CommandStatus::InvalidControlIP));
        assert!(controller.status_report().engineering_mode);
    }

    #[tokio::test]
    async fn open_then_close() {
        let (controller, roof) = controller(RoofState::Closed);
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::Succeeded);
        assert_eq!(controller.status_report().roof, RoofState::Open);
        assert_eq!(send(&controller, Command::Close).await, CommandStatus::Succeeded);
        assert_eq!(controller.status_report().roof, RoofState::Closed);
        assert_eq!(roof.commands(), vec![MotorCommand::Open, MotorCommand::Close]);
    }

    #[tokio::test]
    async fn close_when_closed_sends_nothing() {
        let (controller, roof) = controller(RoofState::Closed);
        assert_eq!(send(&controller, Command::Close).await, CommandStatus::Succeeded);
        assert_eq!(controller.status_report().roof, RoofState::Closed);
        assert!(roof.commands().is_empty());
    }

    #[tokio::test]
    async fn concurrent_motion_is_blocked() {
        let (controller, _roof) = controller(RoofState::Closed);
        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.handle(TCS, Command::Open).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(controller.status_report().roof, RoofState::Opening);
        assert_eq!(send(&controller, Command::Close).await, CommandStatus::Blocked);
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::Blocked);

        let first = first.await.unwrap();
        assert!(first.result.is_success());
        assert_eq!(controller.status_report().roof, RoofState::Open);
    }

    #[tokio::test]
    async fn unconfirmed_motion_is_partially_open() {
        let (controller, roof) = controller(RoofState::Closed);
        roof.set_behaviour(SimBehaviour::Partial);
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::Failed);
        assert_eq!(controller.status_report().roof, RoofState::PartiallyOpen);
    }

    #[tokio::test]
    async fn stalled_motion_times_out_and_stops() {
        let (controller, roof) = controller(RoofState::Closed);
        roof.set_behaviour(SimBehaviour::Stall);
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::Failed);
        assert_eq!(controller.status_report().roof, RoofState::PartiallyOpen);
        assert_eq!(roof.commands(), vec![MotorCommand::Open, MotorCommand::Stop]);
    }

    #[tokio::test]
    async fn rejected_command_is_failed() {
        let (controller, roof) = controller(RoofState::Open);
        roof.set_behaviour(SimBehaviour::Reject);
        assert_eq!(send(&controller, Command::Close).await, CommandStatus::Failed);
        assert_eq!(controller.status_report().roof, RoofState::PartiallyOpen);
    }

    #[tokio::test]
    async fn stop_aborts_motion() {
        let (controller, roof) = controller(RoofState::Closed);
        roof.set_behaviour(SimBehaviour::Stall);
        let open = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.handle(TCS, Command::Open).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(send(&controller, Command::Stop).await, CommandStatus::Succeeded);

        let open = open.await.unwrap();
        assert_eq!(open.result.status(), Some(CommandStatus::Failed));
        assert_eq!(controller.status_report().roof, RoofState::PartiallyOpen);
        assert_eq!(roof.commands(), vec![MotorCommand::Open, MotorCommand::Stop]);
    }

    #[tokio::test]
    async fn heartbeat_enable_validates_timeout() {
        let (controller, _roof) = controller(RoofState::Closed);
        for bad in [0.0, -1.0, 240.0, 1000.0] {
            assert_eq!(
                send(&controller, Command::HeartbeatEnable { timeout: bad }).await,
                CommandStatus::HeartbeatInvalidTimeout
            );
        }
        assert_eq!(controller.status_report().heartbeat, HeartbeatState::Disabled);

        assert_eq!(
            send(&controller, Command::HeartbeatEnable { timeout: 60.0 }).await,
            CommandStatus::Succeeded
        );
        let report = controller.status_report();
        assert_eq!(report.heartbeat, HeartbeatState::Active);
        assert_eq!(report.heartbeat_timeout, Some(60.0));
        assert!(report.heartbeat_until.is_some_and(|until| until > report.date));
    }

    #[tokio::test]
    async fn engineering_mode_excludes_heartbeat_and_motion() {
        let (controller, _roof) = controller(RoofState::Closed);
        send(&controller, Command::HeartbeatEnable { timeout: 60.0 }).await;
        assert_eq!(
            send(&controller, Command::EngineeringEnable).await,
            CommandStatus::EngineeringModeRequiresHeartbeatDisabled
        );
        assert!(!controller.status_report().engineering_mode);

        send(&controller, Command::HeartbeatDisable).await;
        assert_eq!(send(&controller, Command::EngineeringEnable).await, CommandStatus::Succeeded);
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::EngineeringModeActive);
        assert_eq!(
            send(&controller, Command::HeartbeatEnable { timeout: 60.0 }).await,
            CommandStatus::EngineeringModeActive
        );
        assert_eq!(controller.status_report().roof, RoofState::Closed);

        assert_eq!(send(&controller, Command::EngineeringDisable).await, CommandStatus::Succeeded);
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::Succeeded);
    }

    #[tokio::test]
    async fn forced_close_after_expiry() {
        let (controller, roof) = controller(RoofState::Open);
        send(&controller, Command::HeartbeatEnable { timeout: 0.01 }).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(controller.expire_heartbeat());
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::HeartbeatTimedOut);
        assert_eq!(send(&controller, Command::Close).await, CommandStatus::HeartbeatTimedOut);
        assert_eq!(send(&controller, Command::Stop).await, CommandStatus::HeartbeatTimedOut);
        assert_eq!(
            send(&controller, Command::HeartbeatDisable).await,
            CommandStatus::HeartbeatCloseInProgress
        );
        assert!(controller.handle(TCS, Command::StatusQuery).await.status.is_some());

        assert_eq!(controller.forced_close().await, CommandStatus::Succeeded);
        let report = controller.status_report();
        assert_eq!(report.roof, RoofState::Closed);
        assert_eq!(report.heartbeat, HeartbeatState::TimedOut);
        assert_eq!(roof.commands(), vec![MotorCommand::Close]);

        // Timed out but no longer closing.
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::HeartbeatTimedOut);
        assert_eq!(
            send(&controller, Command::HeartbeatRefresh).await,
            CommandStatus::HeartbeatTimedOut
        );
        assert_eq!(send(&controller, Command::HeartbeatDisable).await, CommandStatus::Succeeded);
        assert_eq!(send(&controller, Command::Open).await, CommandStatus::Succeeded);
    }

    #[tokio::test]
    async fn stop_cannot_abort_forced_close() {
        let (controller, roof) = controller(RoofState::Open);
        send(&controller, Command::HeartbeatEnable { timeout: 0.01 }).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(controller.expire_heartbeat());
        let closing = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.forced_close().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(controller.status_report().roof, RoofState::Closing);
        assert_eq!(send(&controller, Command::Stop).await, CommandStatus::HeartbeatTimedOut);

        assert_eq!(closing.await.unwrap(), CommandStatus::Succeeded);
        assert_eq!(controller.status_report().roof, RoofState::Closed);
        assert_eq!(roof.commands(), vec![MotorCommand::Close]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_stops_never_defeat_forced_close() {
        for round in 0..50 {
            let (controller, _roof) = controller(RoofState::Open);
            send(&controller, Command::HeartbeatEnable { timeout: 0.001 }).await;
            tokio::time::sleep(Duration::from_millis(2)).await;

            let stopper = {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        controller.handle(TCS, Command::Stop).await;
                        tokio::task::yield_now().await;
                    }
                })
            };
            assert!(controller.expire_heartbeat(), "round {round}");
            assert_eq!(controller.forced_close().await, CommandStatus::Succeeded, "round {round}");
            stopper.await.unwrap();
            assert_eq!(controller.status_report().roof, RoofState::Closed, "round {round}");
        }
    }

    #[tokio::test]
    async fn expiry_with_roof_closed_needs_no_close() {
        let (controller, roof) = controller(RoofState::Closed);
        send(&controller, Command::HeartbeatEnable { timeout: 0.01 }).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!controller.expire_heartbeat());
        assert_eq!(controller.status_report().heartbeat, HeartbeatState::TimedOut);
        assert!(roof.commands().is_empty());
    }

    #[tokio::test]
    async fn forced_close_preempts_client_motion() {
        let (controller, roof) = controller(RoofState::Closed);
        send(&controller, Command::HeartbeatEnable { timeout: 0.01 }).await;
        roof.set_behaviour(SimBehaviour::Stall);
        let open = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.handle(TCS, Command::Open).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        roof.set_behaviour(SimBehaviour::Complete);

        assert!(controller.expire_heartbeat());
        assert_eq!(controller.forced_close().await, CommandStatus::Succeeded);
        assert_eq!(open.await.unwrap().result.status(), Some(CommandStatus::Failed));
        assert_eq!(controller.status_report().roof, RoofState::Closed);
        assert_eq!(
            roof.commands(),
            vec![MotorCommand::Open, MotorCommand::Stop, MotorCommand::Close]
        );
    }

    #[tokio::test]
    async fn failed_forced_close_clears_in_progress() {
        let (controller, roof) = controller(RoofState::Open);
        roof.set_behaviour(SimBehaviour::Partial);
        send(&controller, Command::HeartbeatEnable { timeout: 0.01 }).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(controller.expire_heartbeat());
        assert_eq!(controller.forced_close().await, CommandStatus::Failed);
        let report = controller.status_report();
        assert_eq!(report.roof, RoofState::PartiallyOpen);
        assert_eq!(report.heartbeat, HeartbeatState::TimedOut);
        assert_eq!(send(&controller, Command::HeartbeatDisable).await, CommandStatus::Succeeded);
    }

    #[tokio::test]
    async fn shutdown_aborts_motion_and_refuses_commands() {
        let (controller, roof) = controller(RoofState::Closed);
        roof.set_behaviour(SimBehaviour::Stall);
        let mut shutdown = controller.subscribe_shutdown();
        let open = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.handle(TCS, Command::Open).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        controller.shutdown();
        assert!(shutdown.changed().await.is_ok());
        assert!(*shutdown.borrow());
        assert_eq!(open.await.unwrap().result.status(), Some(CommandStatus::Failed));
        assert_eq!(controller.status_report().roof, RoofState::PartiallyOpen);
        assert_eq!(send(&controller, Command::StatusQuery).await, CommandStatus::Failed);
    }
}
