pub mod session_registry_service;
