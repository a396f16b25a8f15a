use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::docker::docker_models::DockerSupportedLanguage;
use crate::models::websocket_message_model::ServerMessage;

/// One connected socket inside a session: the verified display name and
/// the outbound queue its writer task drains.
#[derive(Debug, Clone)]
pub struct Participant {
    pub name: String,
    pub outbound: UnboundedSender<ServerMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Draining,
}

/// Authoritative state of one collaboration session. Lives inside the
/// registry map and is only touched under the per-key guard.
#[derive(Debug)]
pub struct Session {
    pub session_id: String,
    pub language: DockerSupportedLanguage,
    pub code: String,
    pub participants: HashMap<String, Participant>,
    pub last_writer: Option<String>,
    pub phase: SessionPhase,
    pub drain_epoch: u64,
}

/// What a joiner gets back: the buffer snapshot and who is here.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub code: String,
    pub language: DockerSupportedLanguage,
    pub participants: Vec<String>,
}

/// Read-only copy of a session's collaborative state, for logging and
/// assertions.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub code: String,
    pub language: DockerSupportedLanguage,
    pub participants: Vec<String>,
    pub phase: SessionPhase,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown session '{0}'")]
    NotFound(String),
}
