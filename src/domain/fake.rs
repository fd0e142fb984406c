use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use anyhow::{anyhow, Error};
use async_trait::async_trait;

use super::{
    model::{Container, ContainerSpec, ContainerStatus, PortBinding, Provisioned},
    port::ContainerResource,
};

/// In-memory container backend
#[derive(Default)]
pub struct FakeResource {
    containers: Mutex<HashMap<String, Container>>,
    lookups: Mutex<Vec<String>>,
    created: Mutex<Vec<ContainerSpec>>,
    logged: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl FakeResource {
    pub fn insert(&self, name: &str, status: ContainerStatus) -> Container {
        let container = snapshot(name, status, HashMap::new(), 0);
        self.containers
            .lock()
            .unwrap()
            .insert(name.to_string(), container.clone());
        container
    }

    pub fn insert_container(&self, container: Container) {
        self.containers
            .lock()
            .unwrap()
            .insert(container.name.clone(), container);
    }

    pub fn fail_lookups(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<ContainerSpec> {
        self.created.lock().unwrap().clone()
    }

    pub fn logged(&self) -> Vec<String> {
        self.logged.lock().unwrap().clone()
    }
}

fn snapshot(
    name: &str,
    status: ContainerStatus,
    labels: HashMap<String, String>,
    memory: i64,
) -> Container {
    let id = format!("{:0<64}", name.bytes().map(|b| format!("{b:02x}")).collect::<String>());
    Container {
        short_id: Container::short_id(&id),
        id,
        repotags: vec!["mysql:5.7".to_string()],
        labels,
        name: name.to_string(),
        ports: HashMap::from([(
            "3306/tcp".to_string(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("3307".to_string()),
            }]),
        )]),
        status,
        create_time: Some("2024-01-01T00:00:00Z".to_string()),
        total_memory: Some(memory),
    }
}

#[async_trait]
impl ContainerResource for FakeResource {
    async fn get_container(&self, name_or_id: &str) -> Result<Option<Container>, Error> {
        self.lookups.lock().unwrap().push(name_or_id.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("docker daemon unreachable"));
        }
        Ok(self.containers.lock().unwrap().get(name_or_id).cloned())
    }

    async fn get_or_create_container(
        &self,
        spec: &ContainerSpec,
        record_logging: bool,
    ) -> Result<Provisioned, Error> {
        let provisioned = match self.get_container(&spec.name).await? {
            Some(container) => Provisioned::Existing(container),
            None => {
                self.created.lock().unwrap().push(spec.clone());
                let container = snapshot(
                    &spec.name,
                    ContainerStatus::Running,
                    spec.labels.clone(),
                    spec.mem_limit,
                );
                self.insert_container(container.clone());
                Provisioned::Created(container)
            }
        };
        if record_logging {
            self.log_container(provisioned.container()).await?;
        }
        Ok(provisioned)
    }

    async fn container_logs(&self, container: &Container) -> Result<String, Error> {
        Ok(format!("[Note] {}: ready for connections.\n", container.name))
    }

    async fn log_container(&self, container: &Container) -> Result<(), Error> {
        self.logged.lock().unwrap().push(container.name.clone());
        Ok(())
    }

    async fn list_instances(&self) -> Result<Vec<Container>, Error> {
        let mut containers: Vec<Container> =
            self.containers.lock().unwrap().values().cloned().collect();
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }
}
