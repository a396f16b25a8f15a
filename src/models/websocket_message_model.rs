use serde::{Deserialize, Serialize};

// PRIMARY STRUCTURES FOR WEBSOCKET MESSAGES

/// Everything a client may send, discriminated by the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinSession {
        session_id: String,
        user_name: String,
        language: String,
    },
    CodeChange {
        session_id: String,
        code: String,
        language: String,
        timestamp: i64,
        sender: String,
    },
    RunCode {
        session_id: String,
        code: String,
        language: String,
    },
    LeaveSession {
        session_id: String,
    },
}

/// Everything the server may push, discriminated by the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    InitialCode { code: String },
    CodeUpdate { code: String, sender: String },
    ParticipantsUpdate { participants: Vec<String> },
    ExecutionStatus { text: String },
    CodeOutput { chunk: String },
    ExecutionComplete,
    ExecutionError { message: String },
}

/***
 * Example messages (as JSON):
 * {
 *   "type": "join_session",
 *   "session_id": "abc123",
 *   "user_name": "ada",
 *   "language": "python"
 * }
 *
 * {
 *   "type": "code_change",
 *   "session_id": "abc123",
 *   "code": "print(1)",
 *   "language": "python",
 *   "timestamp": 1723640000000,
 *   "sender": "ada"
 * }
 *
 * Server push after a peer edit:
 * {
 *   "type": "code_update",
 *   "code": "print(1)",
 *   "sender": "ada"
 * }
*/
