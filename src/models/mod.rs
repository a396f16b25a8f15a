pub mod config_models;
pub mod execution_models;
pub mod session_models;
pub mod validation_models;
pub mod websocket_message_model;
