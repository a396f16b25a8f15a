use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::docker::docker_models::DockerSupportedLanguage;
use crate::models::config_models::Config;
use crate::models::session_models::{
    JoinOutcome, Participant, RegistryError, Session, SessionPhase, SessionSnapshot,
};
use crate::models::websocket_message_model::ServerMessage;

/// Authoritative owner of all session state. Cloning shares the same map;
/// every mutation happens under the per-key guard, and notifications are
/// enqueued before that guard is released, which is what makes delivery
/// order match acceptance order.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Session>>,
    eviction_grace: Duration,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_grace(Config::global().eviction_grace())
    }

    pub fn with_grace(eviction_grace: Duration) -> Self {
        SessionRegistry {
            sessions: Arc::new(DashMap::new()),
            eviction_grace,
        }
    }

    /// Adds a connection to a session, creating the session with an empty
    /// buffer on first join. For an existing session the supplied language
    /// is ignored. Re-join of the same connection refreshes its entry, it
    /// never duplicates. The joiner gets `initial_code`, everyone gets
    /// `participants_update`, both enqueued under the guard.
    pub fn join(
        &self,
        session_id: &str,
        connection_id: &str,
        display_name: &str,
        language: DockerSupportedLanguage,
        outbound: UnboundedSender<ServerMessage>,
    ) -> JoinOutcome {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!("session {} created ({})", session_id, language);
                Session {
                    session_id: session_id.to_string(),
                    language,
                    code: String::new(),
                    participants: HashMap::new(),
                    last_writer: None,
                    phase: SessionPhase::Active,
                    drain_epoch: 0,
                }
            });
        let session = entry.value_mut();

        // Any join invalidates an armed eviction timer.
        session.phase = SessionPhase::Active;
        session.drain_epoch += 1;

        session.participants.insert(
            connection_id.to_string(),
            Participant {
                name: display_name.to_string(),
                outbound: outbound.clone(),
            },
        );

        let names = participant_names(session);
        let outcome = JoinOutcome {
            code: session.code.clone(),
            language: session.language,
            participants: names.clone(),
        };

        let _ = outbound.send(ServerMessage::InitialCode {
            code: session.code.clone(),
        });
        broadcast(session, ServerMessage::ParticipantsUpdate {
            participants: names,
        });

        debug!(
            "connection {} joined session {} as '{}'",
            connection_id, session_id, display_name
        );
        outcome
    }

    /// Removes a connection and tells the remaining participants. The last
    /// leave flips the session to draining and arms a delayed eviction; a
    /// rejoin inside the grace window keeps the buffer alive.
    pub fn leave(
        &self,
        session_id: &str,
        connection_id: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let (names, drain_epoch) = {
            let mut entry = self
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| RegistryError::NotFound(session_id.to_string()))?;
            let session = entry.value_mut();

            let was_member = session.participants.remove(connection_id).is_some();
            let names = participant_names(session);
            if !was_member {
                debug!(
                    "connection {} was not in session {}",
                    connection_id, session_id
                );
                return Ok(names);
            }

            broadcast(session, ServerMessage::ParticipantsUpdate {
                participants: names.clone(),
            });

            if session.participants.is_empty() {
                session.phase = SessionPhase::Draining;
                debug!(
                    "session {} drained, eviction in {:?}",
                    session_id, self.eviction_grace
                );
                (names, Some(session.drain_epoch))
            } else {
                (names, None)
            }
        };

        if let Some(epoch) = drain_epoch {
            self.arm_eviction(session_id.to_string(), epoch);
        }
        Ok(names)
    }

    /// Replaces the shared buffer. Last write in arrival order wins; every
    /// participant except the writer gets exactly one `code_update`,
    /// enqueued under the guard. Returns the names that were notified.
    pub fn update_buffer(
        &self,
        session_id: &str,
        connection_id: &str,
        sender_tag: &str,
        code: String,
    ) -> Result<Vec<String>, RegistryError> {
        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::NotFound(session_id.to_string()))?;
        let session = entry.value_mut();

        session.code = code.clone();
        session.last_writer = Some(connection_id.to_string());

        let update = ServerMessage::CodeUpdate {
            code,
            sender: sender_tag.to_string(),
        };
        let mut notified = Vec::new();
        for (id, participant) in &session.participants {
            if id == connection_id {
                continue;
            }
            if participant.outbound.send(update.clone()).is_ok() {
                notified.push(participant.name.clone());
            }
        }
        notified.sort();
        Ok(notified)
    }

    /// Fans one execution-related message out to every participant, the
    /// submitter included. Events for a session that no longer exists are
    /// dropped, never an error: the run outlived its audience.
    pub fn broadcast_execution_event(&self, session_id: &str, message: ServerMessage) -> usize {
        match self.sessions.get(session_id) {
            Some(entry) => {
                let session = entry.value();
                let mut delivered = 0;
                for participant in session.participants.values() {
                    if participant.outbound.send(message.clone()).is_ok() {
                        delivered += 1;
                    }
                }
                delivered
            }
            None => {
                debug!(
                    "dropping execution event for evicted session {}",
                    session_id
                );
                0
            }
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions.get(session_id).map(|entry| {
            let session = entry.value();
            SessionSnapshot {
                code: session.code.clone(),
                language: session.language,
                participants: participant_names(session),
                phase: session.phase,
            }
        })
    }

    fn arm_eviction(&self, session_id: String, epoch: u64) {
        let registry = self.clone();
        let grace = self.eviction_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            registry.destroy_if_drained(&session_id, epoch);
        });
    }

    /// Timer body. The epoch check makes a stale timer a no-op when anyone
    /// joined (and possibly left again) since this drain began.
    fn destroy_if_drained(&self, session_id: &str, epoch: u64) {
        let removed = self.sessions.remove_if(session_id, |_, session| {
            session.phase == SessionPhase::Draining
                && session.participants.is_empty()
                && session.drain_epoch == epoch
        });
        if removed.is_some() {
            info!("session {} evicted after grace period", session_id);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn participant_names(session: &Session) -> Vec<String> {
    let mut names: Vec<String> = session
        .participants
        .values()
        .map(|p| p.name.clone())
        .collect();
    names.sort();
    names
}

fn broadcast(session: &Session, message: ServerMessage) {
    for participant in session.participants.values() {
        let _ = participant.outbound.send(message.clone());
    }
}
