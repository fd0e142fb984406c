use anyhow::{Context, Error};
use config::{Config, Environment};

#[derive(Debug, serde_derive::Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub docker: DockerConfig,
    pub server: ServerConfig,
    pub mysql: MysqlConfig,
}

#[derive(Debug, serde_derive::Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DockerConfig {
    pub socket: String,
    /// Seconds before a request to the docker daemon is abandoned
    pub timeout: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: "/var/run/docker.sock".to_string(),
            timeout: 120,
        }
    }
}

#[derive(Debug, serde_derive::Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, serde_derive::Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct MysqlConfig {
    /// Tag appended to the `mysql` image when creating instances
    pub tag: String,
    pub record_logging: bool,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            tag: "5.7".to_string(),
            record_logging: false,
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("dolphinarium")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

pub fn load_config() -> Result<AppConfig, Error> {
    load_config_from(environment())
}

fn load_config_from(source: Environment) -> Result<AppConfig, Error> {
    let config = Config::builder()
        .add_source(source)
        .build()
        .context("Can't load configuration")?;

    config
        .try_deserialize()
        .context("Can't deserialize AppConfig from loaded configuration")
}
