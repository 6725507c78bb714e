//! `roofd` – rolling roof daemon
//!
//! ```text
//! roofd [--listen ADDR] <CONFIG> <REGISTRY>
//! ```
//!
//! 1. Loads the machine registry (TOML) and validates the daemon config
//!    (JSON) against it; any error aborts startup before anything runs.
//! 2. Initialises logging with the config's `log_name`.
//! 3. Starts the heartbeat watchdog and the command server on the daemon's
//!    registered address (`--listen` / `ROOFD_LISTEN` overrides).
//! 4. On Ctrl-C, aborts any motion, stops the watchdog and exits.
//!
//! `CONFIG` and `REGISTRY` fall back to `ROOFD_CONFIG` / `ROOFD_REGISTRY`.

mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use roofd_hal::{RoofDriver, SimRoof};
use roofd_kernel::{DaemonConfig, Registry, RoofController, Watchdog};
use roofd_server::CommandServer;
use roofd_types::RoofError;
use tracing::{error, info, warn};

/// Travel time of the simulated roof used in place of the serial controller.
const SIM_TRAVEL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "roofd", version, about = "Rolling roof observatory daemon")]
struct DaemonArgs {
    /// Daemon configuration (JSON)
    #[arg(env = "ROOFD_CONFIG")]
    config: PathBuf,

    /// Machine registry (TOML)
    #[arg(env = "ROOFD_REGISTRY")]
    registry: PathBuf,

    /// Listen here instead of the daemon's registered address
    #[arg(long, env = "ROOFD_LISTEN")]
    listen: Option<SocketAddr>,
}

impl DaemonArgs {
    fn listen_addr(&self, config: &DaemonConfig) -> SocketAddr {
        self.listen.unwrap_or_else(|| config.daemon.socket_addr())
    }

    fn load(&self) -> Result<DaemonConfig, String> {
        let registry = Registry::load(&self.registry).map_err(|e| e.to_string())?;
        DaemonConfig::load(&self.config, &registry).map_err(|e| e.to_string())
    }
}

fn main() -> ExitCode {
    let args = DaemonArgs::parse();

    let config = match args.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red().bold());
            return ExitCode::FAILURE;
        }
    };
    let addr = args.listen_addr(&config);

    let _guard = telemetry::init_tracing(&config.log_name);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run(config, addr)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "daemon stopped with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: DaemonConfig, addr: SocketAddr) -> Result<(), RoofError> {
    let (roof, reports) = SimRoof::new(SIM_TRAVEL);
    let roof = roof.with_id(config.serial_port.clone());
    warn!(
        port = %config.serial_port,
        baud = config.serial_baud,
        "serial motor controller not available; driving simulated roof"
    );
    let driver: Arc<dyn RoofDriver> = Arc::new(roof);

    let controller = Arc::new(RoofController::from_config(&config, driver, reports));
    info!(
        daemon = %config.daemon.name,
        origins = ?controller.gate().origins(),
        "roof daemon starting"
    );

    let watchdog = Watchdog::spawn(Arc::clone(&controller));
    let server = CommandServer::new(Arc::clone(&controller))
        .with_addr(addr)
        .bind()
        .await;
    let server = match server {
        Ok(server) => server,
        Err(e) => {
            controller.shutdown();
            watchdog.join().await;
            return Err(e);
        }
    };
    let serving = tokio::spawn(server.serve());

    let interrupted = tokio::signal::ctrl_c().await;
    if let Err(e) = &interrupted {
        error!(error = %e, "failed to wait for interrupt signal");
    }
    info!("shutting down");
    controller.shutdown();
    watchdog.join().await;
    if let Err(e) = serving.await {
        warn!(error = %e, "command server task ended abnormally");
    }
    interrupted.map_err(RoofError::from)
}
