use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use collab_engine::docker::docker_manager::{LogChunkStream, SandboxRuntime};
use collab_engine::docker::docker_models::{ContainerSpec, ResourceLimits, SandboxError};
use collab_engine::models::execution_models::ResourcePolicy;

/// Scriptable stand-in for the container engine. Tests decide which images
/// exist and what the log stream yields; every create and remove call is
/// recorded for leak assertions.
#[derive(Default)]
pub struct FakeRuntime {
    pub images: HashSet<String>,
    pub chunks: Vec<Vec<u8>>,
    pub hang_logs: bool,
    pub fail_remove: bool,
    pub gate: Option<Arc<Notify>>,
    pub created: Mutex<Vec<ContainerSpec>>,
    pub removed: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn with_images(images: &[&str]) -> Self {
        FakeRuntime {
            images: images.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_output(images: &[&str], chunks: &[&str]) -> Self {
        let mut fake = Self::with_images(images);
        fake.chunks = chunks.iter().map(|c| c.as_bytes().to_vec()).collect();
        fake
    }

    /// Log streams never end until the wall clock intervenes.
    pub fn hanging(images: &[&str]) -> Self {
        let mut fake = Self::with_images(images);
        fake.hang_logs = true;
        fake
    }

    /// Log streams end (empty) once the gate is notified.
    pub fn gated(images: &[&str], gate: Arc<Notify>) -> Self {
        let mut fake = Self::with_images(images);
        fake.gate = Some(gate);
        fake
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn removed_names(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxRuntime for FakeRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool, SandboxError> {
        Ok(self.images.contains(image))
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        self.created.lock().unwrap().push(spec.clone());
        Ok(spec.name.clone())
    }

    async fn start(&self, _container_id: &str) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn stream_logs(&self, _container_id: &str) -> Result<LogChunkStream, SandboxError> {
        if self.hang_logs {
            return Ok(
                futures_util::stream::pending::<Result<Vec<u8>, SandboxError>>().boxed(),
            );
        }
        if let Some(gate) = &self.gate {
            let gate = gate.clone();
            let (tx, rx) = mpsc::unbounded_channel::<Result<Vec<u8>, SandboxError>>();
            tokio::spawn(async move {
                gate.notified().await;
                drop(tx);
            });
            return Ok(UnboundedReceiverStream::new(rx).boxed());
        }
        let chunks: Vec<Result<Vec<u8>, SandboxError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(futures_util::stream::iter(chunks).boxed())
    }

    async fn remove(&self, container_id: &str) -> Result<(), SandboxError> {
        self.removed.lock().unwrap().push(container_id.to_string());
        if self.fail_remove {
            return Err(SandboxError::Engine(
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message: "remove failed".to_string(),
                },
            ));
        }
        Ok(())
    }
}

pub fn test_policy(timeout_ms: u64) -> ResourcePolicy {
    ResourcePolicy {
        limits: ResourceLimits {
            memory_limit_mb: 64,
            cpu_quota: 0.5,
            pids_limit: 32,
        },
        execution_timeout: Duration::from_millis(timeout_ms),
    }
}
