use std::time::Duration;

use crate::docker::docker_models::ResourceLimits;

/// A client's request to run a code snapshot in a fresh sandbox. The code
/// is whatever the client sent, which may differ from the live buffer.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub session_id: String,
    pub language: String,
    pub code: String,
}

/// Everything one execution is allowed to consume.
#[derive(Debug, Clone, Copy)]
pub struct ResourcePolicy {
    pub limits: ResourceLimits,
    pub execution_timeout: Duration,
}

/// Events produced by one run, in the order participants see them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    Status(String),
    Output(String),
    Complete,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Creating,
    Running,
    StreamingOutput,
    Completed,
    Failed,
    Removed,
}

/// Tracks one container through its lifecycle. Exactly one per in-flight
/// run, owned by the coordinator's driver task.
#[derive(Debug)]
pub struct ExecutionHandle {
    pub session_id: String,
    pub container_id: Option<String>,
    pub state: ExecutionState,
}
