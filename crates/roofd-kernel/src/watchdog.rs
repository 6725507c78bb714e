//! [`Watchdog`] – background task enforcing the heartbeat deadline.
//!
//! The task sleeps until the armed heartbeat deadline.  Arming, re-arming or
//! disabling the heartbeat wakes it early so it can pick up the new deadline;
//! a refresh simply moves the deadline and is noticed when the old one fires.
//! When a deadline really has passed, the watchdog asks the controller for a
//! forced close and drives it to completion before waiting again.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep_until;
use tracing::{debug, info};

use crate::controller::RoofController;

/// Handle to the running watchdog task.
pub struct Watchdog {
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Spawn the watchdog for `controller` on the current runtime.
    ///
    /// The task exits once [`RoofController::shutdown`] has been called.
    pub fn spawn(controller: Arc<RoofController>) -> Self {
        let handle = tokio::spawn(run(controller));
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to exit.
    pub async fn join(self) {
        // A panic inside the task has already been reported by the runtime.
        let _ = self.handle.await;
    }
}

async fn run(controller: Arc<RoofController>) {
    let mut shutdown = controller.subscribe_shutdown();
    info!("heartbeat watchdog started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let deadline = controller.heartbeat_deadline();
        let expired = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = expired => {
                if controller.expire_heartbeat() {
                    controller.forced_close().await;
                }
            }
            _ = controller.rearmed() => debug!("heartbeat re-armed"),
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!("heartbeat watchdog stopped");
}
