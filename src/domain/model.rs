use std::collections::HashMap;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

/// Images an instance can be created from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Mysql,
}

impl ImageType {
    pub fn from_name(name: &str) -> Option<ImageType> {
        match name {
            "mysql" => Some(ImageType::Mysql),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Mysql => "mysql",
        }
    }
}

/// Container state as reported by the docker daemon
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Restarting,
    Running,
    Removing,
    Paused,
    Exited,
    Dead,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Restarting => "restarting",
            ContainerStatus::Running => "running",
            ContainerStatus::Removing => "removing",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Dead => "dead",
        }
    }
}

/// Character sets accepted for `--character-set-server`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    Utf8,
    Utf8mb4,
    Latin1,
    Gbk,
    Gb2312,
    Ascii,
    Binary,
}

impl Charset {
    pub const ALL: [Charset; 7] = [
        Charset::Utf8,
        Charset::Utf8mb4,
        Charset::Latin1,
        Charset::Gbk,
        Charset::Gb2312,
        Charset::Ascii,
        Charset::Binary,
    ];

    pub fn from_name(name: &str) -> Option<Charset> {
        Charset::ALL.into_iter().find(|charset| charset.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Charset::Utf8 => "utf8",
            Charset::Utf8mb4 => "utf8mb4",
            Charset::Latin1 => "latin1",
            Charset::Gbk => "gbk",
            Charset::Gb2312 => "gb2312",
            Charset::Ascii => "ascii",
            Charset::Binary => "binary",
        }
    }
}

/// Host side of a published container port.
///
/// Accepts the shapes an operator would type in the panel:
/// `3307`, `["127.0.0.1", 3307]`, `[3307, 3308]`, or `null` to let the
/// daemon pick a free host port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostBinding {
    Port(u16),
    Address(String, u16),
    Ports(Vec<u16>),
    Random,
}

/// Container port (`3306/tcp` or `3306`) to host binding
pub type PortMap = HashMap<String, HostBinding>;

/// A submitted form value.
///
/// Absent and `null` are both `Missing`; a value of the wrong shape is kept
/// as `Invalid` so validation can report it next to the other fields.
#[derive(Clone, Debug, PartialEq)]
pub enum Field<T> {
    Missing,
    Value(T),
    Invalid(serde_json::Value),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Missing
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Value(value)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Field::Missing);
        }
        Ok(match T::deserialize(&raw) {
            Ok(value) => Field::Value(value),
            Err(_) => Field::Invalid(raw),
        })
    }
}

/// Payload of the "create MySQL instance" operation, as submitted
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct InstanceRequest {
    pub image_name: Field<String>,
    pub name: Field<String>,
    pub ports: Field<PortMap>,
    pub mem_limit: Field<i64>,
    pub database: Field<String>,
    pub charset: Field<String>,
    pub root_password: Field<String>,
}

/// Payload of the "configure MySQL" operation, as submitted
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigRequest {
    pub name: Field<String>,
}

/// An instance request that passed validation
#[derive(Clone, Debug, PartialEq)]
pub struct ValidInstance {
    pub image: ImageType,
    pub name: String,
    pub ports: PortMap,
    pub mem_limit: i64,
    pub database: String,
    pub charset: Charset,
    pub root_password: Option<String>,
}

/// Everything needed to run a container, forwarded as-is to the daemon
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub ports: PortMap,
    /// Bytes, zero meaning unlimited
    pub mem_limit: i64,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub labels: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "HostIp")]
    pub host_ip: Option<String>,
    #[serde(rename = "HostPort")]
    pub host_port: Option<String>,
}

/// Read view of a container owned by the docker daemon
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub short_id: String,
    pub repotags: Vec<String>,
    pub labels: HashMap<String, String>,
    pub name: String,
    pub ports: HashMap<String, Option<Vec<PortBinding>>>,
    pub status: ContainerStatus,
    pub create_time: Option<String>,
    pub total_memory: Option<i64>,
}

impl Container {
    pub fn short_id(id: &str) -> String {
        id.chars().take(12).collect()
    }

    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }
}

/// Outcome of a get-or-create call
#[derive(Clone, Debug, PartialEq)]
pub enum Provisioned {
    Existing(Container),
    Created(Container),
}

impl Provisioned {
    pub fn container(&self) -> &Container {
        match self {
            Provisioned::Existing(container) | Provisioned::Created(container) => container,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Provisioned::Created(_))
    }
}
