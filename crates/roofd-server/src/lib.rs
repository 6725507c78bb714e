//! `roofd-server` – Command transport for the roof daemon
//!
//! Requests and responses are single JSON objects, one per line, over TCP:
//!
//! ```text
//! → {"command":"heartbeat-enable","timeout":60.0}
//! ← {"code":0,"message":"command succeeded"}
//! ```
//!
//! The server hands every request to the
//! [`RoofController`][roofd_kernel::RoofController] together with the peer's
//! IP address, which is the origin checked by the access gate.  The
//! [`RoofClient`] speaks the same protocol and turns any transport failure
//! into [`CommandStatus::CommunicationFailure`][roofd_types::CommandStatus].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roofd_kernel::RoofController;
//! use roofd_server::CommandServer;
//!
//! async fn serve(controller: Arc<RoofController>) {
//!     CommandServer::new(controller)
//!         .with_addr("0.0.0.0:9030".parse().unwrap())
//!         .run()
//!         .await
//!         .expect("command server failed");
//! }
//! ```

pub mod client;
pub mod server;

pub use client::{RoofClient, DEFAULT_CLIENT_TIMEOUT};
pub use server::{BoundServer, CommandServer, DEFAULT_PORT};
