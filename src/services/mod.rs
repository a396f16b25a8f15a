pub mod all_session_services;
pub mod cleanup_service;
pub mod execution_services;
pub mod helper_services;
pub mod validation_services;
pub mod websocket;
