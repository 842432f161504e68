use std::error::Error;

use domain::InspectionService;
use infra::{state::FileStateStore, web::router};
use tokio::net::TcpListener;

mod config;
mod domain;
mod infra;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    println!("Start Devrig - bridging your local project and the cluster");

    let config = crate::config::load_config()?;
    println!("Loaded config {:?}", config);

    let working_dir = std::env::current_dir()?;
    let local_name = working_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut service = InspectionService {
        cluster: None,
        engine: None,
        state: Box::new(FileStateStore::new(&working_dir)),
        app: config.app.clone(),
        local_name,
        // A local descriptor, when present, is parsed by an external
        // collaborator and handed over here.
        devfile: None,
    };

    #[cfg(feature = "kube")]
    {
        use anyhow::Context;
        use infra::kubernetes::KubeClusterClient;

        let client = kube::Client::try_default()
            .await
            .context("Can't connect to the cluster")?;
        let namespace = config
            .namespace
            .clone()
            .unwrap_or_else(|| client.default_namespace().to_string());
        service.cluster = Some(Box::new(KubeClusterClient { client, namespace }));
    }

    #[cfg(feature = "docker")]
    {
        use anyhow::Context;
        use bollard::{Docker, API_DEFAULT_VERSION};
        use infra::docker::DockerContainerEngine;

        match Docker::connect_with_socket(&config.docker_socket, 120, API_DEFAULT_VERSION)
            .context("Can't connect to docker socket")
        {
            Ok(docker) => service.engine = Some(Box::new(DockerContainerEngine { docker })),
            Err(e) => log::warn!("Docker engine unavailable, listing cluster only: {:?}", e),
        }
    }

    let listener = TcpListener::bind(&config.listen_address).await?;
    axum::serve(listener, router(service)).await?;
    Ok(())
}
