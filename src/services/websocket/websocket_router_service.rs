use std::str::FromStr;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::docker::docker_models::DockerSupportedLanguage;
use crate::models::execution_models::{ExecutionEvent, RunRequest};
use crate::models::session_models::RegistryError;
use crate::models::websocket_message_model::{ClientMessage, ServerMessage};
use crate::services::all_session_services::session_registry_service::SessionRegistry;
use crate::services::execution_services::execution_coordinator_service::ExecutionCoordinator;
use crate::utils::helper_utils::truncate_for_log;

/// The two shared handles every connection task needs.
#[derive(Clone)]
pub struct WebSocketGateway {
    pub registry: SessionRegistry,
    pub coordinator: ExecutionCoordinator,
}

/// Per-connection routing state. One of these lives in each connection's
/// read loop and remembers which session the socket is in.
pub struct ConnectionRouter {
    gateway: WebSocketGateway,
    connection_id: String,
    outbound: UnboundedSender<ServerMessage>,
    joined_session: Option<String>,
}

impl ConnectionRouter {
    pub fn new(
        gateway: WebSocketGateway,
        connection_id: String,
        outbound: UnboundedSender<ServerMessage>,
    ) -> Self {
        ConnectionRouter {
            gateway,
            connection_id,
            outbound,
            joined_session: None,
        }
    }

    /// Dispatches one parsed client message. Nothing here blocks: execution
    /// relays run on their own tasks.
    pub fn route(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::JoinSession {
                session_id,
                user_name,
                language,
            } => self.handle_join(session_id, user_name, language),
            ClientMessage::CodeChange {
                session_id,
                code,
                sender,
                ..
            } => self.handle_code_change(&session_id, code, &sender),
            ClientMessage::RunCode {
                session_id,
                code,
                language,
            } => self.handle_run(session_id, code, language),
            ClientMessage::LeaveSession { session_id } => self.handle_leave(&session_id),
        }
    }

    fn handle_join(&mut self, session_id: String, user_name: String, language: String) {
        let language = match DockerSupportedLanguage::from_str(&language) {
            Ok(language) => language,
            Err(()) => {
                warn!(
                    "connection {} tried to join {} with unsupported language '{}'",
                    self.connection_id, session_id, language
                );
                self.reply_error(format!("unsupported language '{}'", language));
                return;
            }
        };

        // One session per socket; switching implies leaving the old one.
        if let Some(previous) = self.joined_session.take() {
            if previous != session_id {
                self.leave_session(&previous);
            }
        }

        let outcome = self.gateway.registry.join(
            &session_id,
            &self.connection_id,
            &user_name,
            language,
            self.outbound.clone(),
        );
        info!(
            "connection {} joined session {} as '{}' ({} participants)",
            self.connection_id,
            session_id,
            user_name,
            outcome.participants.len()
        );
        self.joined_session = Some(session_id);
    }

    fn handle_code_change(&mut self, session_id: &str, code: String, sender: &str) {
        debug!(
            "code change from {} for session {}: {}",
            self.connection_id,
            session_id,
            truncate_for_log(&code, 80)
        );
        match self
            .gateway
            .registry
            .update_buffer(session_id, &self.connection_id, sender, code)
        {
            Ok(notified) => debug!(
                "buffer update in {} fanned out to {} peers",
                session_id,
                notified.len()
            ),
            Err(RegistryError::NotFound(_)) => {
                debug!("buffer update for unknown session {} ignored", session_id);
            }
        }
    }

    fn handle_run(&mut self, session_id: String, code: String, language: String) {
        if !self.gateway.registry.contains(&session_id) {
            warn!("run request for unknown session {}", session_id);
            self.reply_error(format!("unknown session '{}'", session_id));
            return;
        }

        info!(
            "run requested for session {} ({}, {} bytes)",
            session_id,
            language,
            code.len()
        );
        let request = RunRequest {
            session_id: session_id.clone(),
            language,
            code,
        };
        let mut events = self.gateway.coordinator.execute(request);

        // The relay is detached: a submitter that disconnects mid-run must
        // not cancel the run for the rest of the session.
        let registry = self.gateway.registry.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let message = execution_event_message(event);
                registry.broadcast_execution_event(&session_id, message);
            }
        });
    }

    fn handle_leave(&mut self, session_id: &str) {
        if self.joined_session.as_deref() == Some(session_id) {
            self.joined_session = None;
        }
        self.leave_session(session_id);
    }

    /// Socket closed without a leave message.
    pub fn handle_disconnect(&mut self) {
        if let Some(session_id) = self.joined_session.take() {
            self.leave_session(&session_id);
        }
    }

    pub fn reply_error(&self, message: String) {
        let _ = self
            .outbound
            .send(ServerMessage::ExecutionError { message });
    }

    fn leave_session(&self, session_id: &str) {
        match self.gateway.registry.leave(session_id, &self.connection_id) {
            Ok(remaining) => debug!(
                "connection {} left session {} ({} remain)",
                self.connection_id,
                session_id,
                remaining.len()
            ),
            Err(RegistryError::NotFound(_)) => {
                debug!("leave for unknown session {} ignored", session_id);
            }
        }
    }
}

pub fn execution_event_message(event: ExecutionEvent) -> ServerMessage {
    match event {
        ExecutionEvent::Status(text) => ServerMessage::ExecutionStatus { text },
        ExecutionEvent::Output(chunk) => ServerMessage::CodeOutput { chunk },
        ExecutionEvent::Complete => ServerMessage::ExecutionComplete,
        ExecutionEvent::Error(message) => ServerMessage::ExecutionError { message },
    }
}
