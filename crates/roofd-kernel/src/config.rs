//! Daemon configuration – parsed from JSON and validated against a closed
//! schema before any subsystem starts.
//!
//! ```json
//! {
//!   "daemon": "obs_roof",
//!   "log_name": "roofd@obs",
//!   "control_machines": ["obs-tcs", "obs-dome-pc"],
//!   "serial_port": "/dev/roof",
//!   "serial_baud": 9600,
//!   "serial_timeout": 3,
//!   "open_timeout": 60,
//!   "close_timeout": 60
//! }
//! ```
//!
//! Validation is all-or-nothing: [`DaemonConfig::from_json_str`] either
//! returns a fully resolved config or a [`ConfigError`] naming the offending
//! field.  Unknown keys are rejected to catch typos.  Daemon and machine
//! names are resolved against the injected [`Registry`] here, so nothing
//! downstream ever sees an unresolved name.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::registry::{DaemonEndpoint, Registry};

/// Every key the schema accepts.  All of them are required.
pub const CONFIG_FIELDS: [&str; 8] = [
    "daemon",
    "log_name",
    "control_machines",
    "serial_port",
    "serial_baud",
    "serial_timeout",
    "open_timeout",
    "close_timeout",
];

/// A configuration document that failed to load or validate.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config root must be a JSON object")]
    NotAnObject,

    #[error("{field}: unknown field")]
    UnknownField { field: String },

    #[error("{field}: required field is missing")]
    MissingField { field: String },

    #[error("{field}: {details}")]
    InvalidType { field: String, details: String },

    #[error("{field}: {reason}")]
    OutOfRange { field: String, reason: String },

    #[error("{field}: unknown daemon '{name}'")]
    UnknownDaemon { field: String, name: String },

    #[error("{field}: unknown machine '{name}'")]
    UnknownMachine { field: String, name: String },
}

impl ConfigError {
    /// Path of the offending field, when the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::UnknownField { field }
            | ConfigError::MissingField { field }
            | ConfigError::InvalidType { field, .. }
            | ConfigError::OutOfRange { field, .. }
            | ConfigError::UnknownDaemon { field, .. }
            | ConfigError::UnknownMachine { field, .. } => Some(field),
            ConfigError::Read { .. } | ConfigError::Parse(_) | ConfigError::NotAnObject => None,
        }
    }
}

/// Fully validated daemon configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub daemon: DaemonEndpoint,
    pub log_name: String,
    /// Origins allowed to issue commands, in configuration order.
    pub control_ips: Vec<IpAddr>,
    pub serial_port: String,
    pub serial_baud: u32,
    pub serial_timeout: Duration,
    pub open_timeout: Duration,
    pub close_timeout: Duration,
}

impl DaemonConfig {
    /// Read, parse and validate the config file at `path`.
    pub fn load(path: &Path, registry: &Registry) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw, registry)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str, registry: &Registry) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value, registry)
    }

    /// Validate an already-parsed JSON document.
    pub fn from_value(value: &Value, registry: &Registry) -> Result<Self, ConfigError> {
        let doc = value.as_object().ok_or(ConfigError::NotAnObject)?;

        if let Some(unknown) = doc.keys().find(|k| !CONFIG_FIELDS.contains(&k.as_str())) {
            return Err(ConfigError::UnknownField {
                field: unknown.clone(),
            });
        }
        if let Some(missing) = CONFIG_FIELDS.iter().find(|k| !doc.contains_key(**k)) {
            return Err(ConfigError::MissingField {
                field: (*missing).to_string(),
            });
        }

        let raw: RawConfig =
            serde_path_to_error::deserialize(value).map_err(|e| ConfigError::InvalidType {
                field: e.path().to_string(),
                details: e.inner().to_string(),
            })?;
        raw.resolve(registry)
    }
}

/// The document as written, before range checks and name resolution.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    daemon: String,
    log_name: String,
    control_machines: Vec<String>,
    serial_port: String,
    serial_baud: f64,
    serial_timeout: f64,
    open_timeout: f64,
    close_timeout: f64,
}

impl RawConfig {
    fn resolve(self, registry: &Registry) -> Result<DaemonConfig, ConfigError> {
        let daemon = registry
            .daemon(&self.daemon)
            .ok_or_else(|| ConfigError::UnknownDaemon {
                field: "daemon".to_string(),
                name: self.daemon.clone(),
            })?;

        let control_ips = self
            .control_machines
            .iter()
            .enumerate()
            .map(|(i, machine)| {
                registry
                    .machine(machine)
                    .ok_or_else(|| ConfigError::UnknownMachine {
                        field: format!("control_machines[{i}]"),
                        name: machine.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DaemonConfig {
            daemon,
            log_name: self.log_name,
            control_ips,
            serial_port: self.serial_port,
            serial_baud: baud("serial_baud", self.serial_baud)?,
            serial_timeout: seconds("serial_timeout", self.serial_timeout)?,
            open_timeout: seconds("open_timeout", self.open_timeout)?,
            close_timeout: seconds("close_timeout", self.close_timeout)?,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Range checks
// ────────────────────────────────────────────────────────────────────────────

/// Integral JSON numbers are accepted in either form (`9600` or `9600.0`).
fn baud(field: &str, value: f64) -> Result<u32, ConfigError> {
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(ConfigError::InvalidType {
            field: field.to_string(),
            details: format!("expected an integer, found {value}"),
        });
    }
    if value < 0.0 {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            reason: format!("{value} is less than the minimum of 0"),
        });
    }
    if value > f64::from(u32::MAX) {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            reason: format!("{value} does not fit a baud rate"),
        });
    }
    Ok(value as u32)
}

fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    if value < 0.0 {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            reason: format!("{value} is less than the minimum of 0"),
        });
    }
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::OutOfRange {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
