//! `bollard`-backed [`ContainerRuntime`]. The only concrete runtime this
//! workspace ships; operation ordering follows `task/docker.go`'s `Run` and
//! `Stop` almost step for step.

use std::collections::HashMap;

use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;

use common::Task;

use super::{ContainerRuntime, ContainerStatus, InspectResult, RuntimeError, RuntimeResult};

pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    /// Connects using the same environment-derived defaults the original
    /// picks up via `client.FromEnv` (`DOCKER_HOST`, TLS vars, etc.).
    pub fn connect_from_env() -> Result<Self, RuntimeError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError(format!("connecting to docker: {e}")))?;
        Ok(Self { client })
    }
}

fn restart_policy_name(policy: &str) -> RestartPolicyNameEnum {
    match policy {
        "always" => RestartPolicyNameEnum::ALWAYS,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
        "no" | "" => RestartPolicyNameEnum::NO,
        _ => RestartPolicyNameEnum::ALWAYS,
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn run(&self, task: &Task) -> Result<RuntimeResult, RuntimeError> {
        let pull_opts = CreateImageOptions {
            from_image: task.image.clone(),
            ..Default::default()
        };
        let mut pull_stream = self.client.create_image(Some(pull_opts), None, None);
        while let Some(progress) = pull_stream.next().await {
            progress.map_err(|e| RuntimeError(format!("pulling image {}: {e}", task.image)))?;
        }

        let exposed_ports: HashMap<String, HashMap<(), ()>> = task
            .exposed_ports
            .iter()
            .map(|port| (port.clone(), HashMap::new()))
            .collect();

        let host_config = HostConfig {
            restart_policy: Some(RestartPolicy {
                name: Some(restart_policy_name(&task.restart_policy)),
                ..Default::default()
            }),
            memory: Some(task.memory as i64),
            nano_cpus: Some((task.cpu * 1_000_000_000.0) as i64),
            publish_all_ports: Some(true),
            ..Default::default()
        };

        let config = ContainerConfig {
            image: Some(task.image.clone()),
            tty: Some(false),
            env: Some(task.env.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_opts = CreateContainerOptions {
            name: task.name.clone(),
            platform: None,
        };

        let created = self
            .client
            .create_container(Some(create_opts), config)
            .await
            .map_err(|e| RuntimeError(format!("creating container: {e}")))?;

        self.client
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError(format!("starting container: {e}")))?;

        Ok(RuntimeResult {
            container_id: Some(created.id),
            action: "start",
        })
    }

    async fn stop(&self, container_id: &str) -> Result<RuntimeResult, RuntimeError> {
        match self
            .client
            .stop_container(container_id, Some(StopContainerOptions { t: 10 }))
            .await
        {
            Ok(()) => {}
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                return Ok(RuntimeResult { container_id: None, action: "stop" });
            }
            Err(e) => return Err(RuntimeError(format!("stopping container {container_id}: {e}"))),
        }

        self.client
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    v: true,
                    link: false,
                    force: false,
                }),
            )
            .await
            .map_err(|e| RuntimeError(format!("removing container {container_id}: {e}")))?;

        Ok(RuntimeResult { container_id: None, action: "stop" })
    }

    async fn inspect(&self, container_id: &str) -> Result<InspectResult, RuntimeError> {
        let inspected = match self
            .client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspected) => inspected,
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                return Ok(InspectResult { status: None, host_ports: HashMap::new() });
            }
            Err(e) => return Err(RuntimeError(format!("inspecting container {container_id}: {e}"))),
        };

        let status = inspected.state.as_ref().and_then(|s| s.status).map(|s| {
            use bollard::models::ContainerStateStatusEnum::*;
            match s {
                RUNNING => ContainerStatus::Running,
                EXITED => ContainerStatus::Exited,
                _ => ContainerStatus::Other,
            }
        });

        let mut host_ports = HashMap::new();
        if let Some(ports) = inspected
            .network_settings
            .as_ref()
            .and_then(|ns| ns.ports.as_ref())
        {
            for (container_port, bindings) in ports {
                if let Some(binding) = bindings.as_ref().and_then(|b| b.first()) {
                    if let Some(host_port) = binding_port(binding) {
                        host_ports.insert(container_port.clone(), host_port);
                    }
                }
            }
        }

        Ok(InspectResult { status, host_ports })
    }
}

fn binding_port(binding: &PortBinding) -> Option<String> {
    binding.host_port.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_policy_name_maps_known_values() {
        assert!(matches!(restart_policy_name("always"), RestartPolicyNameEnum::ALWAYS));
        assert!(matches!(restart_policy_name("no"), RestartPolicyNameEnum::NO));
        assert!(matches!(restart_policy_name("bogus"), RestartPolicyNameEnum::ALWAYS));
    }
}
