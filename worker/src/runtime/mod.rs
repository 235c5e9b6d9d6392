//! The container-runtime adapter contract (§4.6). The core never assumes a
//! specific runtime; [`docker`] is the one concrete implementation this
//! workspace ships, built on `bollard`.

pub mod docker;

use async_trait::async_trait;
use common::Task;

/// Outcome of [`ContainerRuntime::run`] or [`ContainerRuntime::stop`],
/// mirroring the original's `DockerResult` shape (`action`, `result`).
#[derive(Debug, Clone)]
pub struct RuntimeResult {
    pub container_id: Option<String>,
    pub action: &'static str,
}

/// What [`ContainerRuntime::inspect`] reports about a running container.
#[derive(Debug, Clone)]
pub struct InspectResult {
    /// `None` means the runtime no longer knows about this container.
    pub status: Option<ContainerStatus>,
    pub host_ports: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Exited,
    Other,
}

/// Error from a runtime operation. Callers decide what it means for task
/// state (§7: run failures move a task to `Failed`, stop failures do not,
/// inspect failures are skipped).
#[derive(Debug, thiserror::Error)]
#[error("runtime error: {0}")]
pub struct RuntimeError(pub String);

/// The three operations the core consumes from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pulls the image, creates a container with the task's environment,
    /// restart policy, exposed ports, memory cap and CPU quota, starts it,
    /// and publishes all of its ports.
    async fn run(&self, task: &Task) -> Result<RuntimeResult, RuntimeError>;

    /// Stops, then removes (including volumes) the named container.
    async fn stop(&self, container_id: &str) -> Result<RuntimeResult, RuntimeError>;

    /// Reports whether the container is still known to the runtime and, if
    /// so, its status and host port bindings.
    async fn inspect(&self, container_id: &str) -> Result<InspectResult, RuntimeError>;
}
