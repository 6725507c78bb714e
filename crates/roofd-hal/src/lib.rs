//! `roofd-hal` – motor controller abstraction for the rolling roof.
//!
//! - [`driver`] – the [`RoofDriver`] trait plus the [`MotorCommand`] and
//!   [`MotionReport`] vocabulary exchanged with the controller.
//! - [`sim`] – [`SimRoof`], a simulated controller for tests and runs without
//!   hardware attached.

pub mod driver;
pub mod sim;

pub use driver::{report_channel, MotionReport, MotionReporter, MotionReports, MotorCommand, RoofDriver};
pub use sim::{SimBehaviour, SimRoof};
