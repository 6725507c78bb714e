//! Generic [`RoofDriver`] trait for the motor controller that moves the roof.
//!
//! The daemon never speaks to the serial port directly.  It sends
//! [`MotorCommand`]s through this trait and receives asynchronous
//! [`MotionReport`]s on the channel handed out when the driver was built.
//! Byte-level framing, speed ramps and limit-switch debouncing all live behind
//! the trait, so drivers can be swapped without touching the safety logic.

use async_trait::async_trait;
use roofd_types::RoofError;
use tokio::sync::mpsc;

/// Command sent to the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    Open,
    Close,
    Stop,
}

/// Asynchronous notification from the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionReport {
    /// The open limit has been reached.
    Opened,
    /// The closed limit has been reached.
    Closed,
    /// The motor stopped without reaching either limit.
    Partial,
}

/// Receiving half of a driver's motion-report channel.
pub type MotionReports = mpsc::Receiver<MotionReport>;

/// Sending half used by driver implementations.
pub type MotionReporter = mpsc::Sender<MotionReport>;

/// Capacity of the motion-report channel created by [`report_channel`].
pub const REPORT_CHANNEL_CAPACITY: usize = 16;

/// Create a motion-report channel for a driver implementation.
pub fn report_channel() -> (MotionReporter, MotionReports) {
    mpsc::channel(REPORT_CHANNEL_CAPACITY)
}

/// A motor controller able to drive the roof.
///
/// `send` must return once the command has been handed to the controller;
/// it must not wait for the motion to finish.  Completion is reported
/// separately as a [`MotionReport`].
#[async_trait]
pub trait RoofDriver: Send + Sync {
    /// Stable identifier for log output, e.g. the serial port path.
    fn id(&self) -> &str;

    /// Hand `command` to the motor controller.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::Driver`] if the controller cannot accept the
    /// command (port closed, controller in a fault state, ...).
    async fn send(&self, command: MotorCommand) -> Result<(), RoofError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Minimal driver that records commands and answers them immediately.
    struct EchoDriver {
        id: String,
        sent: Mutex<Vec<MotorCommand>>,
        reporter: MotionReporter,
    }

    #[async_trait]
    impl RoofDriver for EchoDriver {
        fn id(&self) -> &str {
            &self.id
        }

        async fn send(&self, command: MotorCommand) -> Result<(), RoofError> {
            self.sent.lock().unwrap().push(command);
            let report = match command {
                MotorCommand::Open => MotionReport::Opened,
                MotorCommand::Close => MotionReport::Closed,
                MotorCommand::Stop => MotionReport::Partial,
            };
            self.reporter
                .send(report)
                .await
                .map_err(|e| RoofError::Driver {
                    component: self.id.clone(),
                    details: e.to_string(),
                })
        }
    }

    #[tokio::test]
    async fn driver_reports_through_channel() {
        let (reporter, mut reports) = report_channel();
        let driver = EchoDriver {
            id: "echo".to_string(),
            sent: Mutex::new(Vec::new()),
            reporter,
        };
        assert_eq!(driver.id(), "echo");

        driver.send(MotorCommand::Open).await.unwrap();
        driver.send(MotorCommand::Stop).await.unwrap();

        assert_eq!(reports.recv().await, Some(MotionReport::Opened));
        assert_eq!(reports.recv().await, Some(MotionReport::Partial));
        assert_eq!(
            *driver.sent.lock().unwrap(),
            vec![MotorCommand::Open, MotorCommand::Stop]
        );
    }

    #[tokio::test]
    async fn closed_channel_surfaces_as_driver_fault() {
        let (reporter, reports) = report_channel();
        drop(reports);
        let driver = EchoDriver {
            id: "echo".to_string(),
            sent: Mutex::new(Vec::new()),
            reporter,
        };
        let result = driver.send(MotorCommand::Close).await;
        assert!(matches!(result, Err(RoofError::Driver { .. })));
    }
}
