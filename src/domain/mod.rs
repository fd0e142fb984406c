use std::sync::Arc;

use error::ProvisionError;
use log::info;
use map_macro::hash_map;
use model::{ConfigRequest, Container, ContainerSpec, InstanceRequest, Provisioned, ValidInstance};
use port::ContainerResource;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Value};

use crate::config::MysqlConfig;

pub mod error;
pub mod model;
pub mod port;
pub mod validation;

#[cfg(test)]
pub mod fake;

pub const MANAGED_LABEL: &str = "dolphinarium.managed";
pub const DATABASE_LABEL: &str = "dolphinarium.database";
pub const CHARSET_LABEL: &str = "dolphinarium.charset";

pub struct ProvisioningService {
    pub resource: Arc<dyn ContainerResource>,
    pub mysql: MysqlConfig,
}

pub struct CreatedInstance {
    pub provisioned: Provisioned,
    /// Only known when the container was created by this request
    pub root_password: Option<String>,
}

pub struct InstanceSettings {
    pub container: Container,
    pub database: Option<String>,
    pub charset: Option<String>,
}

/// Serializes a snapshot the way the panel renders it. `None` gives `{}`.
pub fn container_to_json(container: Option<&Container>, detail: bool) -> Value {
    let Some(container) = container else {
        return json!({});
    };
    let mut resp = json!({
        "id": container.id,
        "short_id": container.short_id,
        "repotags": container.repotags,
        "labels": container.labels,
        "name": container.name,
        "ports": container.ports,
        "status": container.status,
        "create_time": container.create_time,
    });
    if detail {
        resp["total_memory"] = json!(container.total_memory.unwrap_or(0));
    }
    resp
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

fn container_spec(instance: &ValidInstance, mysql: &MysqlConfig, root_password: &str) -> ContainerSpec {
    ContainerSpec {
        image: format!("{}:{}", instance.image.as_str(), mysql.tag),
        name: instance.name.clone(),
        ports: instance.ports.clone(),
        mem_limit: instance.mem_limit,
        env: vec![
            format!("MYSQL_DATABASE={}", instance.database),
            format!("MYSQL_ROOT_PASSWORD={}", root_password),
        ],
        cmd: vec![format!("--character-set-server={}", instance.charset.as_str())],
        labels: hash_map! {
            MANAGED_LABEL.to_string() => "true".to_string(),
            DATABASE_LABEL.to_string() => instance.database.clone(),
            CHARSET_LABEL.to_string() => instance.charset.as_str().to_string(),
        },
    }
}

pub async fn create_instance(
    request: &InstanceRequest,
    service: &ProvisioningService,
) -> Result<CreatedInstance, ProvisionError> {
    let instance = validation::validate_instance(request, service.resource.as_ref()).await?;
    let root_password = instance.root_password.clone().unwrap_or_else(generate_password);
    let spec = container_spec(&instance, &service.mysql, &root_password);

    let provisioned = service
        .resource
        .get_or_create_container(&spec, service.mysql.record_logging)
        .await?;
    match provisioned {
        Provisioned::Created(ref container) => {
            info!("MySQL instance {} created ({})", container.name, container.short_id)
        }
        Provisioned::Existing(ref container) => info!(
            "MySQL instance {} already present with status {}",
            container.name,
            container.status.as_str()
        ),
    }
    Ok(CreatedInstance {
        root_password: provisioned.is_created().then_some(root_password),
        provisioned,
    })
}

pub async fn configure_instance(
    request: &ConfigRequest,
    service: &ProvisioningService,
) -> Result<InstanceSettings, ProvisionError> {
    let container = validation::validate_config(request, service.resource.as_ref()).await?;
    Ok(InstanceSettings {
        database: container.labels.get(DATABASE_LABEL).cloned(),
        charset: container.labels.get(CHARSET_LABEL).cloned(),
        container,
    })
}

pub async fn list_instances(service: &ProvisioningService) -> Result<Vec<Container>, anyhow::Error> {
    service.resource.list_instances().await
}

pub async fn instance(
    name: &str,
    service: &ProvisioningService,
) -> Result<Option<Container>, anyhow::Error> {
    service.resource.get_container(name).await
}

pub async fn instance_logs(
    name: &str,
    service: &ProvisioningService,
) -> Result<Option<String>, anyhow::Error> {
    match service.resource.get_container(name).await? {
        Some(container) => Ok(Some(service.resource.container_logs(&container).await?)),
        None => Ok(None),
    }
}
