use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Build {
    pub host: String,
    pub web_socket_port: u16,
    pub service_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Constants {
    pub docker_created_by_label: String,
    pub executor_image_prefix: String,
    pub sandbox_container_prefix: String,
    pub sandbox_workdir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfigs {
    pub memory_limit_mb: u64,
    pub cpu_quota: f64,
    pub pids_limit: i64,
    pub execution_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfigs {
    pub eviction_grace_secs: u64,
    pub max_code_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSocketPoolConfig {
    pub max_connections: usize,
    pub max_message_bytes: usize,
    pub handshake_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub build: Build,
    pub constants: Constants,
    pub sandbox_configs: SandboxConfigs,
    pub session_configs: SessionConfigs,
    pub websocket_pool_config: WebSocketPoolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            build: Build {
                host: "0.0.0.0".to_string(),
                web_socket_port: 8765,
                service_name: "collab-engine".to_string(),
            },
            constants: Constants {
                docker_created_by_label: "created-by".to_string(),
                executor_image_prefix: "collab_executor".to_string(),
                sandbox_container_prefix: "collab_sandbox".to_string(),
                sandbox_workdir: "/sandbox".to_string(),
            },
            sandbox_configs: SandboxConfigs {
                memory_limit_mb: 256,
                cpu_quota: 0.5,
                pids_limit: 64,
                execution_timeout_secs: 10,
            },
            session_configs: SessionConfigs {
                eviction_grace_secs: 30,
                max_code_bytes: 65_536,
            },
            websocket_pool_config: WebSocketPoolConfig {
                max_connections: 256,
                max_message_bytes: 1_048_576,
                handshake_timeout_ms: 10_000,
            },
        }
    }
}
