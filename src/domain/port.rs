use anyhow::Error;
use async_trait::async_trait;

use super::model::{Container, ContainerSpec, Provisioned};

#[async_trait]
pub trait ContainerResource: Send + Sync {
    /// `None` when the daemon does not know the container
    async fn get_container(&self, name_or_id: &str) -> Result<Option<Container>, Error>;

    async fn get_or_create_container(
        &self,
        spec: &ContainerSpec,
        record_logging: bool,
    ) -> Result<Provisioned, Error>;

    async fn container_logs(&self, container: &Container) -> Result<String, Error>;

    async fn log_container(&self, container: &Container) -> Result<(), Error>;

    async fn list_instances(&self) -> Result<Vec<Container>, Error>;
}
