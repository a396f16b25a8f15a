use thiserror::Error;

use crate::docker::docker_models::DockerSupportedLanguage;

pub struct ValidationService;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported language '{0}'")]
    InvalidLanguage(String),
    #[error("language must be specified")]
    EmptyLanguage,
    #[error("code must be provided")]
    EmptyCode,
    #[error("code exceeds the {limit} byte limit")]
    CodeTooLarge { limit: usize },
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

/// A run request that passed validation; the language is the parsed enum
/// from here on.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRequest {
    pub session_id: String,
    pub language: DockerSupportedLanguage,
    pub code: String,
}
