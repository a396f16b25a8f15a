use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::models::config_models::SandboxConfigs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DockerSupportedLanguage {
    Python,
    JavaScript,
    Java,
}

impl FromStr for DockerSupportedLanguage {
    type Err = ();

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "python" => Ok(DockerSupportedLanguage::Python),
            "javascript" => Ok(DockerSupportedLanguage::JavaScript),
            "java" => Ok(DockerSupportedLanguage::Java),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DockerSupportedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self {
            DockerSupportedLanguage::Python => "python",
            DockerSupportedLanguage::JavaScript => "javascript",
            DockerSupportedLanguage::Java => "java",
        };
        write!(f, "{}", id)
    }
}

impl DockerSupportedLanguage {
    pub fn is_supported(lang: &str) -> bool {
        DockerSupportedLanguage::from_str(lang).is_ok()
    }
}

/// Everything needed to run one language inside its prebuilt image: which
/// image, what the uploaded entry file is called, and the fixed argv that
/// runs it. Code never appears here; it travels as file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub image: String,
    pub entry_file_name: &'static str,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    pub memory_limit_mb: u64,
    pub cpu_quota: f64,
    pub pids_limit: i64,
}

impl ResourceLimits {
    pub fn from_config(config: &SandboxConfigs) -> Self {
        ResourceLimits {
            memory_limit_mb: config.memory_limit_mb,
            cpu_quota: config.cpu_quota,
            pids_limit: config.pids_limit,
        }
    }

    pub fn memory_bytes(&self) -> i64 {
        (self.memory_limit_mb * 1024 * 1024) as i64
    }

    /// CPU quota in microseconds against the standard 100ms period, so a
    /// quota of 1.0 is one full core.
    pub fn cpu_quota_micros(&self) -> i64 {
        (self.cpu_quota * 100_000.0) as i64
    }
}

/// One container for one run: labeled, capped, network-disabled, with the
/// submitted code uploaded as a file before start.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub entry_file_name: String,
    pub entry_file_contents: Vec<u8>,
    pub workdir: String,
    pub labels: HashMap<String, String>,
    pub limits: ResourceLimits,
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("container engine error: {0}")]
    Engine(#[from] bollard::errors::Error),
    #[error("sandbox image '{0}' not found")]
    ImageMissing(String),
    #[error("failed to package code for upload: {0}")]
    Archive(#[from] std::io::Error),
}
