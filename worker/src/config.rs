//! Worker configuration (§6): a TOML file, overridable by environment
//! variable and then by CLI flag, the same precedence the agent's config
//! manager applied to `agent.toml`.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use common::config::{env, StoreKind};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "common::defaults::default_store_kind")]
    pub store_kind: String,
    /// Directory for the worker's SQLite task store when `store_kind` is
    /// `persistent`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5556
}

fn default_name() -> String {
    "worker-1".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            name: default_name(),
            store_kind: common::defaults::default_store_kind(),
            data_dir: default_data_dir(),
        }
    }
}

impl WorkerConfig {
    /// Loads from `path` if it exists, falling back to defaults otherwise —
    /// a worker with no config file on disk is still a valid worker.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no worker config file found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Applies environment variable overrides (§6), then validates.
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(host) = std::env::var(env::WORKER_HOST) {
            self.host = host;
        }
        if let Ok(port) = std::env::var(env::WORKER_PORT) {
            self.port = port
                .parse()
                .with_context(|| format!("{} is not a valid port", env::WORKER_PORT))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.store_kind
            .parse::<StoreKind>()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        if self.name.trim().is_empty() {
            anyhow::bail!("worker name must not be empty");
        }
        Ok(())
    }

    pub fn listen_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store_kind
            .parse()
            .expect("validated at construction time")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(WorkerConfig::default().validate().is_ok());
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = WorkerConfig::load(Path::new("/nonexistent/worker.toml")).unwrap();
        assert_eq!(config.port, 5556);
    }

    #[test]
    fn load_parses_partial_toml_with_defaults_filled_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.toml");
        std::fs::write(&path, "name = \"worker-2\"\nport = 6000\n").unwrap();

        let config = WorkerConfig::load(&path).unwrap();
        assert_eq!(config.name, "worker-2");
        assert_eq!(config.port, 6000);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn empty_name_fails_validation() {
        let config = WorkerConfig {
            name: "  ".to_string(),
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_store_kind_fails_validation() {
        let config = WorkerConfig {
            store_kind: "bogus".to_string(),
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
