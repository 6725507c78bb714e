//! In-process simulated roof for tests and hardware-free runs.
//!
//! [`SimRoof`] implements [`RoofDriver`] with a configurable travel time and
//! [`SimBehaviour`], and records every command it receives so tests can assert
//! on what the daemon sent to the motor.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use roofd_hal::driver::{MotionReport, MotorCommand, RoofDriver};
//! use roofd_hal::sim::SimRoof;
//!
//! # tokio_test_block(async {
//! let (roof, mut reports) = SimRoof::new(Duration::from_millis(5));
//! roof.send(MotorCommand::Open).await.unwrap();
//! assert_eq!(reports.recv().await, Some(MotionReport::Opened));
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread()
//! #         .enable_time()
//! #         .build()
//! #         .unwrap()
//! #         .block_on(f);
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use roofd_types::RoofError;
use tracing::debug;

use crate::driver::{report_channel, MotionReport, MotionReporter, MotionReports, MotorCommand, RoofDriver};

/// How the simulated motor responds to open/close commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimBehaviour {
    /// Reach the commanded limit after the travel time.
    #[default]
    Complete,
    /// Accept the command and never report back.
    Stall,
    /// Stop short of the limit after the travel time.
    Partial,
    /// Refuse the command with a driver fault.
    Reject,
}

#[derive(Default)]
struct SimMotor {
    behaviour: SimBehaviour,
    /// Bumped on every command so superseded motions never report.
    generation: u64,
    moving: bool,
    sent: Vec<MotorCommand>,
}

/// A simulated roof motor controller.
pub struct SimRoof {
    id: String,
    travel: Duration,
    motor: Arc<Mutex<SimMotor>>,
    reporter: MotionReporter,
}

impl SimRoof {
    /// Create a simulated roof whose motions take `travel` to complete.
    ///
    /// Returns the driver together with the receiving end of its
    /// motion-report channel.
    pub fn new(travel: Duration) -> (Self, MotionReports) {
        let (reporter, reports) = report_channel();
        let roof = Self {
            id: "sim-roof".to_string(),
            travel,
            motor: Arc::new(Mutex::new(SimMotor::default())),
            reporter,
        };
        (roof, reports)
    }

    /// Override the identifier (builder-style).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the initial behaviour (builder-style).
    pub fn with_behaviour(self, behaviour: SimBehaviour) -> Self {
        self.set_behaviour(behaviour);
        self
    }

    /// Change how subsequent open/close commands are answered.
    pub fn set_behaviour(&self, behaviour: SimBehaviour) {
        self.motor().behaviour = behaviour;
    }

    /// Every command received so far, in order.
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.motor().sent.clone()
    }

    /// `true` while a simulated motion has not yet reported.
    pub fn is_moving(&self) -> bool {
        self.motor().moving
    }

    fn motor(&self) -> MutexGuard<'_, SimMotor> {
        self.motor.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fault(&self, details: &str) -> RoofError {
        RoofError::Driver {
            component: self.id.clone(),
            details: details.to_string(),
        }
    }
}

#[async_trait]
impl RoofDriver for SimRoof {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, command: MotorCommand) -> Result<(), RoofError> {
        let (generation, behaviour, was_moving) = {
            let mut motor = self.motor();
            motor.sent.push(command);
            motor.generation += 1;
            let was_moving = motor.moving;
            motor.moving = false;
            (motor.generation, motor.behaviour, was_moving)
        };
        debug!(driver = %self.id, ?command, ?behaviour, "sim roof command");

        let target = match command {
            MotorCommand::Stop => {
                if was_moving {
                    // A full channel only drops a report nobody is waiting for.
                    let _ = self.reporter.try_send(MotionReport::Partial);
                }
                return Ok(());
            }
            MotorCommand::Open => MotionReport::Opened,
            MotorCommand::Close => MotionReport::Closed,
        };

        let report = match behaviour {
            SimBehaviour::Reject => return Err(self.fault("command rejected by controller")),
            SimBehaviour::Stall => {
                self.motor().moving = true;
                return Ok(());
            }
            SimBehaviour::Complete => target,
            SimBehaviour::Partial => MotionReport::Partial,
        };

        self.motor().moving = true;
        let motor = Arc::clone(&self.motor);
        let reporter = self.reporter.clone();
        let travel = self.travel;
        tokio::spawn(async move {
            tokio::time::sleep(travel).await;
            {
                let mut motor = motor.lock().unwrap_or_else(|e| e.into_inner());
                if motor.generation != generation {
                    return;
                }
                motor.moving = false;
            }
            let _ = reporter.send(report).await;
        });
        Ok(())
    }
}
