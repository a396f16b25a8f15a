pub mod docker;
pub mod models;
pub mod services;
pub mod utils;
