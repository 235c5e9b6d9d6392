//! Configuration primitives shared by the manager's and worker's own config
//! modules: environment variable names, and the two closed-set choices
//! (store backend, scheduler policy) that spec.md's §6 construction
//! parameters name.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variables §6 names. Each binary's CLI overrides these at
/// construction time the same way the monitoring agent's CLI overrides its
/// loaded TOML config.
pub mod env {
    pub const MANAGER_HOST: &str = "CUBE_MANAGER_HOST";
    pub const MANAGER_PORT: &str = "CUBE_MANAGER_PORT";
    pub const WORKER_HOST: &str = "CUBE_WORKER_HOST";
    pub const WORKER_PORT: &str = "CUBE_WORKER_PORT";
}

/// Store backend selection (§4.2, §6). Unlike [`SchedulerKind`] there is no
/// silent default here — an unrecognized value is a configuration error,
/// since picking the wrong store changes durability guarantees rather than
/// just placement quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Persistent,
}

impl FromStr for StoreKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StoreKind::Memory),
            "persistent" => Ok(StoreKind::Persistent),
            other => Err(crate::Error::Config(format!(
                "unknown store type '{other}', expected 'memory' or 'persistent'"
            ))),
        }
    }
}

/// Scheduler policy selection (§4.4). Per spec.md, an unknown configuration
/// value defaults to round-robin rather than failing construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    RoundRobin,
    Epvm,
}

impl FromStr for SchedulerKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "epvm" => SchedulerKind::Epvm,
            _ => SchedulerKind::RoundRobin,
        })
    }
}
