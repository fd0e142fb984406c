use std::collections::HashMap;

use anyhow::{anyhow, Context, Error};
use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
        LogsOptions, StartContainerOptions,
    },
    errors::Error as DockerError,
    image::CreateImageOptions,
    secret::{
        ContainerInspectResponse, ContainerStateStatusEnum, CreateImageInfo, HostConfig,
        PortBinding as DockerPortBinding,
    },
    Docker,
};
use futures::TryStreamExt;
use itertools::Itertools;
use log::info;
use map_macro::hash_map;

use crate::domain::{
    model::{
        Container, ContainerSpec, ContainerStatus, HostBinding, PortBinding, PortMap, Provisioned,
    },
    port::ContainerResource,
    MANAGED_LABEL,
};

pub struct DockerResource {
    pub docker: Docker,
}

#[async_trait]
impl ContainerResource for DockerResource {
    async fn get_container(&self, name_or_id: &str) -> Result<Option<Container>, Error> {
        match self
            .docker
            .inspect_container(name_or_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => self.snapshot(response).await.map(Some),
            Err(e) if is_not_found(&e) => {
                info!("{}", e);
                Ok(None)
            }
            Err(e) => Err(e).context(format!("Error while inspecting container {}", name_or_id)),
        }
    }

    async fn get_or_create_container(
        &self,
        spec: &ContainerSpec,
        record_logging: bool,
    ) -> Result<Provisioned, Error> {
        let provisioned = match self.get_container(&spec.name).await? {
            Some(container) => Provisioned::Existing(container),
            None => {
                info!("No container {} detected, running it from {}", spec.name, spec.image);
                let id = self.create(spec).await?;
                self.docker
                    .start_container(id.as_str(), None::<StartContainerOptions<String>>)
                    .await
                    .context(format!("Error starting container {}", spec.name))?;
                let container = self
                    .get_container(&id)
                    .await?
                    .ok_or_else(|| anyhow!("Container {} disappeared right after start", spec.name))?;
                Provisioned::Created(container)
            }
        };
        if record_logging {
            self.log_container(provisioned.container()).await?;
        }
        Ok(provisioned)
    }

    async fn container_logs(&self, container: &Container) -> Result<String, Error> {
        let output = self
            .docker
            .logs(
                container.id.as_str(),
                Some(LogsOptions::<String> {
                    stdout: true,
                    stderr: true,
                    tail: "all".to_string(),
                    ..Default::default()
                }),
            )
            .try_collect::<Vec<LogOutput>>()
            .await
            .context(format!("Error while reading logs of container {}", container.name))?;
        Ok(output.into_iter().join(""))
    }

    async fn log_container(&self, container: &Container) -> Result<(), Error> {
        let logs = self.container_logs(container).await?;
        for line in logs.lines() {
            info!("{} => {}", container.name, line);
        }
        Ok(())
    }

    async fn list_instances(&self) -> Result<Vec<Container>, Error> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters: hash_map! {
                    "label".to_string() => vec![format!("{}=true", MANAGED_LABEL)]
                },
                ..Default::default()
            }))
            .await
            .context("Error while listing managed containers")?;

        let snapshots = futures::future::try_join_all(
            containers
                .into_iter()
                .filter_map(|container| container.id)
                .map(|id| async move { self.get_container(&id).await }),
        )
        .await?;
        Ok(snapshots.into_iter().flatten().collect())
    }
}

impl DockerResource {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, Error> {
        let options = || {
            Some(CreateContainerOptions {
                name: spec.name.as_str(),
                platform: None,
            })
        };
        match self
            .docker
            .create_container(options(), container_config(spec))
            .await
        {
            Ok(response) => Ok(response.id),
            Err(e) if is_not_found(&e) => {
                self.pull_image(&spec.image).await?;
                self.docker
                    .create_container(options(), container_config(spec))
                    .await
                    .map(|response| response.id)
                    .context(format!("Error while creating container {}", spec.name))
            }
            Err(e) => Err(e).context(format!("Error while creating container {}", spec.name)),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), Error> {
        info!("Pull image {}", image);
        self.docker
            .create_image(
                Some(CreateImageOptions {
                    from_image: image,
                    ..Default::default()
                }),
                None,
                None,
            )
            .try_collect::<Vec<CreateImageInfo>>()
            .await
            .context(format!("Error while pulling image {}", image))?;
        Ok(())
    }

    async fn snapshot(&self, response: ContainerInspectResponse) -> Result<Container, Error> {
        let image_id = response
            .image
            .clone()
            .context("Docker returned a container without image")?;
        let image = self
            .docker
            .inspect_image(&image_id)
            .await
            .context(format!("Can't inspect image {}", image_id))?;
        snapshot_from(response, image.repo_tags.unwrap_or_default(), image.created)
    }
}

fn is_not_found(e: &DockerError) -> bool {
    matches!(
        e,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn port_key(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{}/tcp", port)
    }
}

fn host_bindings(binding: &HostBinding) -> Vec<DockerPortBinding> {
    let bind = |host_ip: Option<&str>, host_port: u16| DockerPortBinding {
        host_ip: host_ip.map(String::from),
        host_port: Some(host_port.to_string()),
    };
    match binding {
        HostBinding::Port(port) => vec![bind(None, *port)],
        HostBinding::Address(ip, port) => vec![bind(Some(ip.as_str()), *port)],
        HostBinding::Ports(ports) => ports.iter().map(|port| bind(None, *port)).collect(),
        HostBinding::Random => vec![DockerPortBinding {
            host_ip: None,
            host_port: None,
        }],
    }
}

fn port_bindings(ports: &PortMap) -> HashMap<String, Option<Vec<DockerPortBinding>>> {
    ports
        .iter()
        .map(|(port, binding)| (port_key(port), Some(host_bindings(binding))))
        .collect()
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    Config {
        image: Some(spec.image.clone()),
        env: Some(spec.env.clone()),
        cmd: Some(spec.cmd.clone()),
        labels: Some(spec.labels.clone()),
        exposed_ports: Some(
            spec.ports
                .keys()
                .map(|port| (port_key(port), HashMap::new()))
                .collect(),
        ),
        host_config: Some(HostConfig {
            port_bindings: Some(port_bindings(&spec.ports)),
            memory: Some(spec.mem_limit),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn status_from(status: Option<ContainerStateStatusEnum>) -> ContainerStatus {
    match status {
        Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerStatus::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerStatus::Removing,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerStatus::Paused,
        Some(ContainerStateStatusEnum::EXITED) => ContainerStatus::Exited,
        Some(ContainerStateStatusEnum::DEAD) => ContainerStatus::Dead,
        Some(ContainerStateStatusEnum::CREATED)
        | Some(ContainerStateStatusEnum::EMPTY)
        | None => ContainerStatus::Created,
    }
}

fn snapshot_from(
    response: ContainerInspectResponse,
    repotags: Vec<String>,
    create_time: Option<String>,
) -> Result<Container, Error> {
    let id = response
        .id
        .context("Docker returned a container without id")?;
    let ports = response
        .network_settings
        .and_then(|settings| settings.ports)
        .unwrap_or_default()
        .into_iter()
        .map(|(port, bindings)| {
            let bindings = bindings.map(|bindings| {
                bindings
                    .into_iter()
                    .map(|binding| PortBinding {
                        host_ip: binding.host_ip,
                        host_port: binding.host_port,
                    })
                    .collect()
            });
            (port, bindings)
        })
        .collect();

    Ok(Container {
        short_id: Container::short_id(&id),
        id,
        repotags,
        labels: response
            .config
            .and_then(|config| config.labels)
            .unwrap_or_default(),
        name: response
            .name
            .map(|name| name.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        ports,
        status: status_from(response.state.and_then(|state| state.status)),
        create_time,
        total_memory: response.host_config.and_then(|host_config| host_config.memory),
    })
}

#[cfg(test)]
mod tests {
    use bollard::secret::{ContainerConfig, ContainerState, NetworkSettings};

    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            image: "mysql:5.7".to_string(),
            name: "inventory".to_string(),
            ports: hash_map! {
                "3306".to_string() => HostBinding::Address("127.0.0.1".to_string(), 3310),
                "33060/tcp".to_string() => HostBinding::Ports(vec![33060, 33061]),
            },
            mem_limit: 268_435_456,
            env: vec!["MYSQL_DATABASE=inventory".to_string()],
            cmd: vec!["--character-set-server=utf8".to_string()],
            labels: hash_map! { MANAGED_LABEL.to_string() => "true".to_string() },
        }
    }

    #[test]
    fn config_publishes_every_requested_port() {
        let config = container_config(&spec());
        let exposed = config.exposed_ports.unwrap();
        assert!(exposed.contains_key("3306/tcp"));
        assert!(exposed.contains_key("33060/tcp"));

        let host_config = config.host_config.unwrap();
        assert_eq!(host_config.memory, Some(268_435_456));
        let bindings = host_config.port_bindings.unwrap();
        assert_eq!(
            bindings["3306/tcp"],
            Some(vec![DockerPortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some("3310".to_string()),
            }])
        );
        let ports: Vec<Option<String>> = bindings["33060/tcp"]
            .clone()
            .unwrap()
            .into_iter()
            .map(|binding| binding.host_port)
            .collect();
        assert_eq!(ports, vec![Some("33060".to_string()), Some("33061".to_string())]);
    }

    #[test]
    fn config_forwards_env_command_and_labels() {
        let config = container_config(&spec());
        assert_eq!(config.image.as_deref(), Some("mysql:5.7"));
        assert_eq!(config.env.unwrap(), vec!["MYSQL_DATABASE=inventory"]);
        assert_eq!(config.cmd.unwrap(), vec!["--character-set-server=utf8"]);
        assert_eq!(config.labels.unwrap()[MANAGED_LABEL], "true");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_from(Some(ContainerStateStatusEnum::RUNNING)), ContainerStatus::Running);
        assert_eq!(status_from(Some(ContainerStateStatusEnum::EXITED)), ContainerStatus::Exited);
        assert_eq!(status_from(None), ContainerStatus::Created);
    }

    #[test]
    fn snapshot_is_built_from_inspect_response() {
        let response = ContainerInspectResponse {
            id: Some("8dfafdbc3a40c5f1d5b8e9d1d0b3c2a1f0e9d8c7b6a5f4e3d2c1b0a9f8e7d6c5".to_string()),
            name: Some("/inventory".to_string()),
            image: Some("sha256:1234".to_string()),
            config: Some(ContainerConfig {
                labels: Some(hash_map! { MANAGED_LABEL.to_string() => "true".to_string() }),
                ..Default::default()
            }),
            state: Some(ContainerState {
                status: Some(ContainerStateStatusEnum::PAUSED),
                ..Default::default()
            }),
            host_config: Some(HostConfig {
                memory: Some(268_435_456),
                ..Default::default()
            }),
            network_settings: Some(NetworkSettings {
                ports: Some(hash_map! {
                    "3306/tcp".to_string() => Some(vec![DockerPortBinding {
                        host_ip: Some("0.0.0.0".to_string()),
                        host_port: Some("3310".to_string()),
                    }]),
                    "33060/tcp".to_string() => None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container = snapshot_from(
            response,
            vec!["mysql:5.7".to_string()],
            Some("2023-10-18T02:50:30Z".to_string()),
        )
        .unwrap();
        assert_eq!(container.short_id, "8dfafdbc3a40");
        assert_eq!(container.name, "inventory");
        assert_eq!(container.status, ContainerStatus::Paused);
        assert_eq!(container.repotags, vec!["mysql:5.7"]);
        assert_eq!(container.labels[MANAGED_LABEL], "true");
        assert_eq!(container.total_memory, Some(268_435_456));
        assert_eq!(container.ports["33060/tcp"], None);
        assert_eq!(
            container.ports["3306/tcp"],
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("3310".to_string()),
            }])
        );
    }

    #[test]
    fn null_host_port_lets_the_daemon_choose() {
        let spec = ContainerSpec {
            ports: hash_map! { "3306/tcp".to_string() => HostBinding::Random },
            ..spec()
        };
        let bindings = container_config(&spec).host_config.unwrap().port_bindings.unwrap();
        assert_eq!(
            bindings["3306/tcp"],
            Some(vec![DockerPortBinding {
                host_ip: None,
                host_port: None,
            }])
        );
    }

    #[test]
    fn only_404_means_not_found() {
        let response = |status_code: u16| DockerError::DockerResponseServerError {
            status_code,
            message: "No such container: crm".to_string(),
        };
        assert!(is_not_found(&response(404)));
        assert!(!is_not_found(&response(409)));
        assert!(!is_not_found(&response(500)));
    }

    #[test]
    fn snapshot_requires_an_id() {
        assert!(snapshot_from(ContainerInspectResponse::default(), vec![], None).is_err());
    }
}
