pub mod docker_manager;
pub mod docker_models;
