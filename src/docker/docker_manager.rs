use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::HostConfig;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::docker::docker_models::{ContainerSpec, SandboxError};
use crate::utils::tar_utils::archive_single_file;

/// Stdout/stderr chunks from one container. Finite: the stream ends when
/// the process exits or the container is removed.
pub type LogChunkStream = BoxStream<'static, Result<Vec<u8>, SandboxError>>;

/// The only door to the container engine. Everything above this trait is
/// engine-agnostic, which is also what lets the tests run without a daemon.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    async fn image_exists(&self, image: &str) -> Result<bool, SandboxError>;

    /// Creates the container and uploads the entry file into the sandbox
    /// workdir. Returns the engine-assigned container id. The container is
    /// not started yet.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, SandboxError>;

    async fn start(&self, container_id: &str) -> Result<(), SandboxError>;

    async fn stream_logs(&self, container_id: &str) -> Result<LogChunkStream, SandboxError>;

    /// Force-removes the container and its volumes. An already-gone
    /// container is not an error.
    async fn remove(&self, container_id: &str) -> Result<(), SandboxError>;
}

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        DockerRuntime { docker }
    }

    pub fn connect() -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(DockerRuntime { docker })
    }

    pub async fn ping(&self) -> Result<(), SandboxError> {
        self.docker.ping().await?;
        Ok(())
    }
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool, SandboxError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(SandboxError::Engine(e)),
        }
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        let host_config = HostConfig {
            memory: Some(spec.limits.memory_bytes()),
            cpu_period: Some(100_000),
            cpu_quota: Some(spec.limits.cpu_quota_micros()),
            pids_limit: Some(spec.limits.pids_limit),
            network_mode: Some("none".to_string()),
            cap_drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        };

        let config = ContainerConfig {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.workdir.clone()),
            labels: Some(spec.labels.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: &spec.name,
                    platform: None,
                }),
                config,
            )
            .await?;
        debug!(
            "created container {} from image {}",
            created.id, spec.image
        );

        let archive = archive_single_file(&spec.entry_file_name, &spec.entry_file_contents)?;
        self.docker
            .upload_to_container(
                &created.id,
                Some(UploadToContainerOptions {
                    path: spec.workdir.clone(),
                    ..Default::default()
                }),
                archive.into(),
            )
            .await?;
        debug!(
            "uploaded {} ({} bytes) into container {}",
            spec.entry_file_name,
            spec.entry_file_contents.len(),
            created.id
        );

        Ok(created.id)
    }

    async fn start(&self, container_id: &str) -> Result<(), SandboxError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stream_logs(&self, container_id: &str) -> Result<LogChunkStream, SandboxError> {
        let docker = self.docker.clone();
        let id = container_id.to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let options = LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            };
            let mut stream = Box::pin(docker.logs(&id, Some(options)));
            while let Some(entry) = stream.next().await {
                let item = match entry {
                    Ok(LogOutput::StdOut { message })
                    | Ok(LogOutput::StdErr { message })
                    | Ok(LogOutput::Console { message }) => Ok(message.to_vec()),
                    Ok(LogOutput::StdIn { .. }) => continue,
                    Err(e) => Err(SandboxError::Engine(e)),
                };
                if tx.send(item).is_err() {
                    break;
                }
            }
        });

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn remove(&self, container_id: &str) -> Result<(), SandboxError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self.docker.remove_container(container_id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(SandboxError::Engine(e)),
        }
    }
}
