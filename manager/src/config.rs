//! Manager configuration (§6): worker address list, scheduler and store
//! selection, listen address. Same load-then-override precedence as the
//! worker's config: TOML file, environment variable, CLI flag.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use common::config::{env, SchedulerKind, StoreKind};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `host:port` addresses of the workers this manager dispatches to.
    #[serde(default = "default_workers")]
    pub workers: Vec<String>,
    #[serde(default = "common::defaults::default_scheduler_name")]
    pub scheduler: String,
    #[serde(default = "common::defaults::default_store_kind")]
    pub store_kind: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "common::defaults::default_requeue_on_placement_error")]
    pub requeue_on_placement_error: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5555
}

fn default_workers() -> Vec<String> {
    vec![
        "localhost:5556".to_string(),
        "localhost:5557".to_string(),
        "localhost:5558".to_string(),
    ]
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            scheduler: common::defaults::default_scheduler_name(),
            store_kind: common::defaults::default_store_kind(),
            data_dir: default_data_dir(),
            requeue_on_placement_error: common::defaults::default_requeue_on_placement_error(),
        }
    }
}

impl ManagerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no manager config file found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(host) = std::env::var(env::MANAGER_HOST) {
            self.host = host;
        }
        if let Ok(port) = std::env::var(env::MANAGER_PORT) {
            self.port = port
                .parse()
                .with_context(|| format!("{} is not a valid port", env::MANAGER_PORT))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.store_kind
            .parse::<StoreKind>()
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        if self.workers.is_empty() {
            anyhow::bail!("manager must be configured with at least one worker address");
        }
        for addr in &self.workers {
            common::utils::parse_host_port(addr).map_err(|e| anyhow::anyhow!("{e}"))?;
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

    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.scheduler.parse().expect("SchedulerKind::from_str is infallible")
    }

    /// Worker base URLs, named `worker-1`, `worker-2`, ... in configured
    /// order, matching the original's address-list-derived node names.
    pub fn worker_nodes(&self) -> Vec<(String, String)> {
        self.workers
            .iter()
            .enumerate()
            .map(|(i, addr)| (format!("worker-{}", i + 1), format!("http://{addr}")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ManagerConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_worker_list_fails_validation() {
        let config = ManagerConfig {
            workers: vec![],
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_worker_address_fails_validation() {
        let config = ManagerConfig {
            workers: vec!["not-a-host-port".to_string()],
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn worker_nodes_names_are_stable_and_ordered() {
        let config = ManagerConfig {
            workers: vec!["a:1".to_string(), "b:2".to_string()],
            ..ManagerConfig::default()
        };
        let nodes = config.worker_nodes();
        assert_eq!(nodes[0], ("worker-1".to_string(), "http://a:1".to_string()));
        assert_eq!(nodes[1], ("worker-2".to_string(), "http://b:2".to_string()));
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = ManagerConfig::load(Path::new("/nonexistent/manager.toml")).unwrap();
        assert_eq!(config.port, 5555);
    }
}
