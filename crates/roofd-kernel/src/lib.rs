//! `roofd-kernel` – Safety & Access Control
//!
//! Everything that decides whether the roof may move, and what happens when a
//! client stops answering.
//!
//! # Modules
//!
//! - [`registry`] – [`Registry`][registry::Registry]: site-wide table of
//!   daemon endpoints and control machine addresses.
//! - [`config`] – [`DaemonConfig`][config::DaemonConfig]: loads and
//!   validates the daemon's JSON configuration against a closed schema.
//! - [`access_gate`] – [`AccessGate`][access_gate::AccessGate]: admits
//!   commands only from configured control machines.
//! - [`roof`] – [`RoofMachine`][roof::RoofMachine]: pure roof state
//!   transitions.
//! - [`heartbeat`] – [`Heartbeat`][heartbeat::Heartbeat]: deadman switch
//!   state and deadlines.
//! - [`engineering`] – [`EngineeringMode`][engineering::EngineeringMode]:
//!   maintenance override, mutually exclusive with the heartbeat.
//! - [`controller`] – [`RoofController`][controller::RoofController]: the
//!   single serialization point through which every command and the forced
//!   close pass.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: background task that
//!   closes the roof when the heartbeat expires.

pub mod access_gate;
pub mod config;
pub mod controller;
pub mod engineering;
pub mod heartbeat;
pub mod registry;
pub mod roof;
pub mod watchdog;

pub use access_gate::AccessGate;
pub use config::{ConfigError, DaemonConfig};
pub use controller::RoofController;
pub use engineering::EngineeringMode;
pub use heartbeat::{Heartbeat, MAX_HEARTBEAT_TIMEOUT};
pub use registry::{DaemonEndpoint, Registry, RegistryError};
pub use roof::{Motion, RoofMachine};
pub use watchdog::Watchdog;
