use std::collections::HashMap;

use bollard::Docker;
use bollard::container::{ListContainersOptions, RemoveContainerOptions};
use tracing::{info, warn};

use crate::models::config_models::Config;

/// Sweeps sandbox containers that carry this service's label. Per-run
/// removal is the primary guarantee; the sweep runs at startup and
/// shutdown to catch whatever a crash left behind.
pub struct CleanupService;

impl CleanupService {
    pub async fn sweep_managed_containers() -> Result<usize, bollard::errors::Error> {
        let docker = Docker::connect_with_local_defaults()?;
        let config = Config::global();
        let label_filter = format!(
            "{}={}",
            config.constants.docker_created_by_label, config.build.service_name
        );

        let options = ListContainersOptions::<String> {
            all: true,
            filters: HashMap::from([("label".to_string(), vec![label_filter])]),
            ..Default::default()
        };
        let containers = docker.list_containers(Some(options)).await?;

        let mut removed = 0;
        for container in containers {
            let Some(id) = container.id else { continue };
            let result = docker
                .remove_container(
                    &id,
                    Some(RemoveContainerOptions {
                        force: true,
                        v: true,
                        ..Default::default()
                    }),
                )
                .await;
            match result {
                Ok(()) => {
                    info!("removed leftover container {}", id);
                    removed += 1;
                }
                Err(e) => warn!("failed to remove leftover container {}: {}", id, e),
            }
        }
        Ok(removed)
    }
}
