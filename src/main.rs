use std::{error::Error, io::Write, sync::Arc};

use anyhow::Context;
use bollard::{Docker, API_DEFAULT_VERSION};
use config::load_config;
use infra::{docker::DockerResource, web::router};
use log::{info, warn};
use tokio::net::TcpListener;

mod config;
mod domain;
mod infra;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{}  {}:{}  {}  {}",
                buf.timestamp_millis(),
                record.module_path().unwrap_or_default(),
                std::process::id(),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    info!("Start Dolphinarium - MySQL instances on your docker host");

    let config = load_config()?;
    info!("Loaded config {:?}", config);
    let docker = Docker::connect_with_socket(&config.docker.socket, config.docker.timeout, API_DEFAULT_VERSION)
        .context("Can't connect to docker socket")?;
    match docker.version().await {
        Ok(version) => info!("Docker version : {}", version.version.unwrap_or_default()),
        Err(e) => warn!("Docker daemon is not answering yet: {}", e),
    }

    let service = domain::ProvisioningService {
        resource: Arc::new(DockerResource { docker }),
        mysql: config.mysql.clone(),
    };

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .context(format!("Can't listen on {}", config.server.listen))?;
    info!("Listening on {}", config.server.listen);
    axum::serve(listener, router(service)).await?;
    Ok(())
}
