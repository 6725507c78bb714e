//! [`Registry`] – the site's machine and daemon directory.
//!
//! Configuration files refer to machines and daemons by name.  The registry
//! maps those names to network addresses and is handed to the config
//! validator explicitly, so name resolution never depends on process-wide
//! state.
//!
//! The on-disk form is TOML:
//!
//! ```toml
//! [machines]
//! obs-tcs = "10.2.6.100"
//! obs-dome-pc = "10.2.6.110"
//!
//! [daemons.obs_roof]
//! host = "10.2.6.101"
//! port = 9030
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Failure to read or parse a registry file.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read registry at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Network location of a named daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonEndpoint {
    pub name: String,
    pub host: IpAddr,
    pub port: u16,
}

impl DaemonEndpoint {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct DaemonEntry {
    host: IpAddr,
    port: u16,
}

/// Directory of known machines and daemons.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
    #[serde(default)]
    machines: BTreeMap<String, IpAddr>,
    #[serde(default)]
    daemons: BTreeMap<String, DaemonEntry>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a machine (builder-style).  Re-adding a name replaces its address.
    pub fn with_machine(mut self, name: impl Into<String>, ip: IpAddr) -> Self {
        self.machines.insert(name.into(), ip);
        self
    }

    /// Add a daemon (builder-style).
    pub fn with_daemon(mut self, name: impl Into<String>, host: IpAddr, port: u16) -> Self {
        self.daemons.insert(name.into(), DaemonEntry { host, port });
        self
    }

    /// Parse a registry from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, RegistryError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse a registry file.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Address of the machine called `name`.
    pub fn machine(&self, name: &str) -> Option<IpAddr> {
        self.machines.get(name).copied()
    }

    /// Endpoint of the daemon called `name`.
    pub fn daemon(&self, name: &str) -> Option<DaemonEndpoint> {
        self.daemons.get(name).map(|entry| DaemonEndpoint {
            name: name.to_string(),
            host: entry.host,
            port: entry.port,
        })
    }
}
