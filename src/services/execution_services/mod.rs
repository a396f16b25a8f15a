pub mod execution_coordinator_service;
pub mod language_executor_service;
