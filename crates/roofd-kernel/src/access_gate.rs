//! [`AccessGate`] – admits commands only from configured control machines.
//!
//! Every externally originated command, including heartbeat refreshes and
//! engineering-mode toggles, is checked with [`AccessGate::check`] before it
//! can touch the roof, heartbeat or engineering state.  A rejected origin
//! receives [`CommandStatus::InvalidControlIP`].

use std::collections::HashSet;
use std::net::IpAddr;

use roofd_types::CommandStatus;

use crate::config::DaemonConfig;

/// Immutable allow-list of command origins.
///
/// # Example
///
/// ```
/// use std::net::{IpAddr, Ipv4Addr};
/// use roofd_kernel::access_gate::AccessGate;
///
/// let tcs = IpAddr::V4(Ipv4Addr::new(10, 2, 6, 100));
/// let gate = AccessGate::new([tcs]);
///
/// assert!(gate.authorize(tcs));
/// assert!(!gate.authorize(IpAddr::V4(Ipv4Addr::new(10, 2, 6, 99))));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    ordered: Vec<IpAddr>,
    allowed: HashSet<IpAddr>,
}

impl AccessGate {
    /// Build a gate from an ordered list of origins.  Duplicates are kept
    /// once, at their first position.
    pub fn new(origins: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut gate = Self::default();
        for ip in origins {
            let ip = ip.to_canonical();
            if gate.allowed.insert(ip) {
                gate.ordered.push(ip);
            }
        }
        gate
    }

    /// Build the gate for a validated daemon configuration.
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(config.control_ips.iter().copied())
    }

    /// `true` when `origin` may issue commands.
    ///
    /// IPv4-mapped IPv6 origins (as reported by dual-stack sockets) are
    /// compared by their IPv4 address.
    pub fn authorize(&self, origin: IpAddr) -> bool {
        self.allowed.contains(&origin.to_canonical())
    }

    /// Return `Ok(())` for an allowed origin, or
    /// [`CommandStatus::InvalidControlIP`] otherwise.
    pub fn check(&self, origin: IpAddr) -> Result<(), CommandStatus> {
        if self.authorize(origin) {
            Ok(())
        } else {
            Err(CommandStatus::InvalidControlIP)
        }
    }

    /// Allowed origins in configuration order.
    pub fn origins(&self) -> &[IpAddr] {
        &self.ordered
    }
}
