use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::docker::docker_manager::SandboxRuntime;
use crate::docker::docker_models::{ContainerSpec, ResourceLimits, SandboxError};
use crate::models::config_models::Config;
use crate::models::execution_models::{
    ExecutionEvent, ExecutionHandle, ExecutionState, ResourcePolicy, RunRequest,
};
use crate::models::validation_models::{ValidRequest, ValidationService};
use crate::services::execution_services::language_executor_service::generate_launch_plan;

impl ResourcePolicy {
    pub fn from_config(config: &Config) -> Self {
        ResourcePolicy {
            limits: ResourceLimits::from_config(&config.sandbox_configs),
            execution_timeout: config.execution_timeout(),
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutionState::Creating => "creating",
            ExecutionState::Running => "running",
            ExecutionState::StreamingOutput => "streaming_output",
            ExecutionState::Completed => "completed",
            ExecutionState::Failed => "failed",
            ExecutionState::Removed => "removed",
        };
        write!(f, "{}", label)
    }
}

impl ExecutionHandle {
    fn new(session_id: &str) -> Self {
        ExecutionHandle {
            session_id: session_id.to_string(),
            container_id: None,
            state: ExecutionState::Creating,
        }
    }

    fn transition(&mut self, state: ExecutionState) {
        debug!("execution for session {} -> {}", self.session_id, state);
        self.state = state;
    }
}

/// Owns the sandbox lifecycle of every run: validation, one-run-per-session
/// admission, container create/start/stream/remove on a spawned driver
/// task, and the ordered event stream participants see. Cloning shares the
/// engine handle and the admission set.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    runtime: Arc<dyn SandboxRuntime>,
    policy: ResourcePolicy,
    active_runs: Arc<DashMap<String, ()>>,
}

impl ExecutionCoordinator {
    pub fn new(runtime: Arc<dyn SandboxRuntime>) -> Self {
        Self::with_policy(runtime, ResourcePolicy::from_config(Config::global()))
    }

    pub fn with_policy(runtime: Arc<dyn SandboxRuntime>, policy: ResourcePolicy) -> Self {
        ExecutionCoordinator {
            runtime,
            policy,
            active_runs: Arc::new(DashMap::new()),
        }
    }

    /// Runs one request. The returned stream yields events in production
    /// order and always ends with `Complete` or exactly one `Error`; a
    /// request that fails validation or admission produces that single
    /// error without touching the engine. Container work happens on a
    /// spawned driver task, never on the caller's path.
    pub fn execute(&self, request: RunRequest) -> UnboundedReceiverStream<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        let valid = match ValidationService::validate_request(&request) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("rejected run for session {}: {}", request.session_id, e);
                let _ = tx.send(ExecutionEvent::Error(e.to_string()));
                return UnboundedReceiverStream::new(rx);
            }
        };

        // One sandbox per session at a time.
        match self.active_runs.entry(valid.session_id.clone()) {
            Entry::Occupied(_) => {
                warn!("session {} already has a run in flight", valid.session_id);
                let _ = tx.send(ExecutionEvent::Error(
                    "busy: an execution is already running for this session".to_string(),
                ));
                return UnboundedReceiverStream::new(rx);
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.drive(valid, tx).await;
        });

        UnboundedReceiverStream::new(rx)
    }

    /// Driver body for one run. Whatever happens inside the budgeted
    /// window, the container is gone and the admission slot is free before
    /// the terminal event goes out.
    async fn drive(self, request: ValidRequest, events: UnboundedSender<ExecutionEvent>) {
        let session_id = request.session_id.clone();
        let container_name = format!(
            "{}_{}",
            Config::global().constants.sandbox_container_prefix,
            Uuid::new_v4()
        );
        let mut handle = ExecutionHandle::new(&session_id);
        info!(
            "execution starting for session {} ({}) in container {}",
            session_id, request.language, container_name
        );

        let outcome = tokio::time::timeout(
            self.policy.execution_timeout,
            self.run_sandbox(&request, &container_name, &mut handle, &events),
        )
        .await;

        let terminal = match outcome {
            Ok(Ok(())) => {
                handle.transition(ExecutionState::Completed);
                ExecutionEvent::Complete
            }
            Ok(Err(e)) => {
                handle.transition(ExecutionState::Failed);
                error!("execution failed for session {}: {}", session_id, e);
                ExecutionEvent::Error(e.to_string())
            }
            Err(_) => {
                handle.transition(ExecutionState::Failed);
                warn!(
                    "execution for session {} exceeded {:?}, killing container",
                    session_id, self.policy.execution_timeout
                );
                ExecutionEvent::Error("timeout".to_string())
            }
        };

        // Removal keys off the container name, which is known even when a
        // create was cut short by the timeout.
        if handle.container_id.is_some() {
            match self.runtime.remove(&container_name).await {
                Ok(()) => handle.transition(ExecutionState::Removed),
                Err(e) => warn!("failed to remove container {}: {}", container_name, e),
            }
        }

        self.active_runs.remove(&session_id);
        let _ = events.send(terminal);
        info!(
            "execution finished for session {} ({})",
            session_id, handle.state
        );
    }

    async fn run_sandbox(
        &self,
        request: &ValidRequest,
        container_name: &str,
        handle: &mut ExecutionHandle,
        events: &UnboundedSender<ExecutionEvent>,
    ) -> Result<(), SandboxError> {
        let plan = generate_launch_plan(request.language);

        // A missing image is a deployment problem, not something to retry.
        if !self.runtime.image_exists(&plan.image).await? {
            return Err(SandboxError::ImageMissing(plan.image));
        }

        let _ = events.send(ExecutionEvent::Status(
            ExecutionState::Creating.to_string(),
        ));

        let config = Config::global();
        let spec = ContainerSpec {
            name: container_name.to_string(),
            image: plan.image,
            command: plan.command,
            entry_file_name: plan.entry_file_name.to_string(),
            entry_file_contents: request.code.clone().into_bytes(),
            workdir: config.constants.sandbox_workdir.clone(),
            labels: HashMap::from([(
                config.constants.docker_created_by_label.clone(),
                config.build.service_name.clone(),
            )]),
            limits: self.policy.limits,
        };

        // Mark the attempt before it happens so cleanup also covers a
        // create that never returned.
        handle.container_id = Some(container_name.to_string());
        let engine_id = self.runtime.create(&spec).await?;
        debug!(
            "container {} created for session {} (engine id {})",
            container_name, request.session_id, engine_id
        );

        self.runtime.start(container_name).await?;
        handle.transition(ExecutionState::Running);
        let _ = events.send(ExecutionEvent::Status(ExecutionState::Running.to_string()));

        handle.transition(ExecutionState::StreamingOutput);
        let mut logs = self.runtime.stream_logs(container_name).await?;
        while let Some(chunk) = logs.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            let _ = events.send(ExecutionEvent::Output(
                String::from_utf8_lossy(&chunk).to_string(),
            ));
        }

        Ok(())
    }
}
