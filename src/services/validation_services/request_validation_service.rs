use std::str::FromStr;

pub use crate::models::validation_models::{ValidRequest, ValidationError, ValidationService};

use crate::docker::docker_models::DockerSupportedLanguage;
use crate::models::config_models::Config;
use crate::models::execution_models::RunRequest;
use tracing::debug;

impl ValidationService {
    /// Rejects a run request before anything touches the engine: unknown
    /// language, empty code, oversized code.
    pub fn validate_request(request: &RunRequest) -> Result<ValidRequest, ValidationError> {
        let language = request.language.trim();
        if language.is_empty() {
            return Err(ValidationError::EmptyLanguage);
        }
        let language = DockerSupportedLanguage::from_str(language)
            .map_err(|_| ValidationError::InvalidLanguage(request.language.clone()))?;

        if request.code.is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        let limit = Config::global().session_configs.max_code_bytes;
        if request.code.len() > limit {
            return Err(ValidationError::CodeTooLarge { limit });
        }

        debug!(
            "validated run request for session {} ({})",
            request.session_id, language
        );
        Ok(ValidRequest {
            session_id: request.session_id.clone(),
            language,
            code: request.code.clone(),
        })
    }
}
