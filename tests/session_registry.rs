use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use collab_engine::docker::docker_models::DockerSupportedLanguage;
use collab_engine::models::session_models::SessionPhase;
use collab_engine::models::websocket_message_model::ServerMessage;
use collab_engine::services::all_session_services::session_registry_service::SessionRegistry;

fn attach() -> (UnboundedSender<ServerMessage>, UnboundedReceiver<ServerMessage>) {
    mpsc::unbounded_channel()
}

fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

#[tokio::test]
async fn first_join_creates_the_session_and_sends_a_snapshot() {
    let registry = SessionRegistry::with_grace(Duration::from_secs(60));
    let (tx, mut rx) = attach();

    let outcome = registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx);
    assert_eq!(outcome.code, "");
    assert_eq!(outcome.language, DockerSupportedLanguage::Python);
    assert_eq!(outcome.participants, vec!["ada".to_string()]);

    let inbox = drain(&mut rx);
    assert_eq!(
        inbox,
        vec![
            ServerMessage::InitialCode {
                code: String::new()
            },
            ServerMessage::ParticipantsUpdate {
                participants: vec!["ada".to_string()]
            },
        ]
    );
}

#[tokio::test]
async fn later_joins_get_the_buffer_and_keep_the_first_language() {
    let registry = SessionRegistry::with_grace(Duration::from_secs(60));
    let (tx_a, _rx_a) = attach();
    let (tx_b, mut rx_b) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx_a);
    registry
        .update_buffer("room", "c1", "ada", "print(1)".to_string())
        .unwrap();

    let outcome = registry.join("room", "c2", "grace", DockerSupportedLanguage::Java, tx_b);
    assert_eq!(outcome.code, "print(1)");
    assert_eq!(outcome.language, DockerSupportedLanguage::Python);
    assert_eq!(
        outcome.participants,
        vec!["ada".to_string(), "grace".to_string()]
    );

    let inbox = drain(&mut rx_b);
    assert_eq!(
        inbox[0],
        ServerMessage::InitialCode {
            code: "print(1)".to_string()
        }
    );
}

#[tokio::test]
async fn buffer_updates_are_last_writer_wins_with_no_echo() {
    let registry = SessionRegistry::with_grace(Duration::from_secs(60));
    let (tx_a, mut rx_a) = attach();
    let (tx_b, mut rx_b) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx_a);
    registry.join("room", "c2", "grace", DockerSupportedLanguage::Python, tx_b);
    drain(&mut rx_a);
    drain(&mut rx_b);

    registry
        .update_buffer("room", "c1", "ada", "X".to_string())
        .unwrap();
    registry
        .update_buffer("room", "c2", "grace", "Y".to_string())
        .unwrap();

    let snapshot = registry.snapshot("room").unwrap();
    assert_eq!(snapshot.code, "Y");

    // Each writer sees only the other's update, exactly once.
    assert_eq!(
        drain(&mut rx_a),
        vec![ServerMessage::CodeUpdate {
            code: "Y".to_string(),
            sender: "grace".to_string()
        }]
    );
    assert_eq!(
        drain(&mut rx_b),
        vec![ServerMessage::CodeUpdate {
            code: "X".to_string(),
            sender: "ada".to_string()
        }]
    );
}

#[tokio::test]
async fn sequential_updates_arrive_in_acceptance_order() {
    let registry = SessionRegistry::with_grace(Duration::from_secs(60));
    let (tx_a, _rx_a) = attach();
    let (tx_b, mut rx_b) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx_a);
    registry.join("room", "c2", "grace", DockerSupportedLanguage::Python, tx_b);
    drain(&mut rx_b);

    for i in 0..10 {
        registry
            .update_buffer("room", "c1", "ada", format!("v{}", i))
            .unwrap();
    }

    let received: Vec<String> = drain(&mut rx_b)
        .into_iter()
        .map(|message| match message {
            ServerMessage::CodeUpdate { code, .. } => code,
            other => panic!("unexpected message {:?}", other),
        })
        .collect();
    let expected: Vec<String> = (0..10).map(|i| format!("v{}", i)).collect();
    assert_eq!(received, expected);
}

#[tokio::test]
async fn rejoining_the_same_connection_never_duplicates() {
    let registry = SessionRegistry::with_grace(Duration::from_secs(60));
    let (tx, _rx) = attach();
    let (tx2, _rx2) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx);
    let outcome = registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx2);

    assert_eq!(outcome.participants, vec!["ada".to_string()]);
    let snapshot = registry.snapshot("room").unwrap();
    assert_eq!(snapshot.participants.len(), 1);
}

#[tokio::test]
async fn leaving_notifies_the_rest_and_unknown_sessions_are_errors() {
    let registry = SessionRegistry::with_grace(Duration::from_secs(60));
    let (tx_a, _rx_a) = attach();
    let (tx_b, mut rx_b) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx_a);
    registry.join("room", "c2", "grace", DockerSupportedLanguage::Python, tx_b);
    drain(&mut rx_b);

    let remaining = registry.leave("room", "c1").unwrap();
    assert_eq!(remaining, vec!["grace".to_string()]);
    assert_eq!(
        drain(&mut rx_b),
        vec![ServerMessage::ParticipantsUpdate {
            participants: vec!["grace".to_string()]
        }]
    );

    assert!(registry.leave("nowhere", "c9").is_err());
}

#[tokio::test]
async fn participant_accounting_leaves_no_ghosts() {
    let registry = SessionRegistry::with_grace(Duration::from_secs(60));
    let (tx_a, _rx_a) = attach();
    let (tx_b, _rx_b) = attach();
    let (tx_c, _rx_c) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx_a);
    registry.join("room", "c2", "grace", DockerSupportedLanguage::Python, tx_b);
    registry.join("room", "c3", "lin", DockerSupportedLanguage::Python, tx_c);
    registry.leave("room", "c2").unwrap();

    let snapshot = registry.snapshot("room").unwrap();
    assert_eq!(
        snapshot.participants,
        vec!["ada".to_string(), "lin".to_string()]
    );
    assert_eq!(snapshot.phase, SessionPhase::Active);
    assert_eq!(registry.session_count(), 1);
}

#[tokio::test]
async fn rejoin_within_the_grace_window_preserves_the_buffer() {
    let registry = SessionRegistry::with_grace(Duration::from_millis(200));
    let (tx_a, _rx_a) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx_a);
    registry
        .update_buffer("room", "c1", "ada", "keep me".to_string())
        .unwrap();
    registry.leave("room", "c1").unwrap();

    // Drained but not yet evicted.
    assert_eq!(
        registry.snapshot("room").unwrap().phase,
        SessionPhase::Draining
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (tx_b, _rx_b) = attach();
    let outcome = registry.join("room", "c2", "grace", DockerSupportedLanguage::Python, tx_b);
    assert_eq!(outcome.code, "keep me");

    // The stale timer fires in this window and must not evict.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(registry.contains("room"));
    assert_eq!(registry.snapshot("room").unwrap().code, "keep me");
}

#[tokio::test]
async fn eviction_after_the_grace_window_starts_fresh() {
    let registry = SessionRegistry::with_grace(Duration::from_millis(100));
    let (tx_a, _rx_a) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx_a);
    registry
        .update_buffer("room", "c1", "ada", "old state".to_string())
        .unwrap();
    registry.leave("room", "c1").unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!registry.contains("room"));

    let (tx_b, _rx_b) = attach();
    let outcome = registry.join("room", "c2", "grace", DockerSupportedLanguage::Java, tx_b);
    assert_eq!(outcome.code, "");
    assert_eq!(outcome.language, DockerSupportedLanguage::Java);
}

#[tokio::test]
async fn execution_events_reach_everyone_and_drop_for_unknown_sessions() {
    let registry = SessionRegistry::with_grace(Duration::from_secs(60));
    let (tx_a, mut rx_a) = attach();
    let (tx_b, mut rx_b) = attach();

    registry.join("room", "c1", "ada", DockerSupportedLanguage::Python, tx_a);
    registry.join("room", "c2", "grace", DockerSupportedLanguage::Python, tx_b);
    drain(&mut rx_a);
    drain(&mut rx_b);

    let delivered =
        registry.broadcast_execution_event("room", ServerMessage::ExecutionComplete);
    assert_eq!(delivered, 2);
    assert_eq!(drain(&mut rx_a), vec![ServerMessage::ExecutionComplete]);
    assert_eq!(drain(&mut rx_b), vec![ServerMessage::ExecutionComplete]);

    let dropped =
        registry.broadcast_execution_event("ghost", ServerMessage::ExecutionComplete);
    assert_eq!(dropped, 0);
}
