pub mod websocket_router_service;
pub mod websocket_server;
