use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use collab_engine::docker::docker_manager::DockerRuntime;
use collab_engine::models::config_models::Config;
use collab_engine::services::all_session_services::session_registry_service::SessionRegistry;
use collab_engine::services::cleanup_service::CleanupService;
use collab_engine::services::execution_services::execution_coordinator_service::ExecutionCoordinator;
use collab_engine::services::helper_services::config_service::{CONFIG_FILE, set_global_config};
use collab_engine::services::websocket::websocket_router_service::WebSocketGateway;
use collab_engine::services::websocket::websocket_server::run_websocket_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = env::args().nth(1).unwrap_or_else(|| CONFIG_FILE.to_string());
    let config = Config::load_or_default(&config_path)?;
    set_global_config(config);

    let runtime = DockerRuntime::connect()?;
    if let Err(e) = runtime.ping().await {
        warn!(
            "container engine not reachable at startup, runs will fail until it is: {}",
            e
        );
    }

    // Crash recovery: anything labeled by a previous instance goes away.
    match CleanupService::sweep_managed_containers().await {
        Ok(removed) if removed > 0 => {
            info!("startup sweep removed {} leftover containers", removed)
        }
        Ok(_) => {}
        Err(e) => warn!("startup container sweep failed: {}", e),
    }

    let gateway = WebSocketGateway {
        registry: SessionRegistry::new(),
        coordinator: ExecutionCoordinator::new(Arc::new(runtime)),
    };

    let addr = Config::global().websocket_addr();
    let listener = TcpListener::bind(&addr).await?;
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(run_websocket_server(listener, gateway, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown.cancel();
    server.await??;

    match CleanupService::sweep_managed_containers().await {
        Ok(removed) => info!("shutdown sweep removed {} containers", removed),
        Err(e) => warn!("shutdown container sweep failed: {}", e),
    }

    Ok(())
}
