use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Image-level container settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    pub image: String,
    /// `KEY=VALUE` entries, passed through untouched.
    pub env: Vec<String>,
    /// Port keys such as `8080/tcp`.
    pub exposed_ports: BTreeSet<String>,
}

/// Host-level container settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    pub auto_remove: bool,
    pub restart_policy: RestartPolicy,
    /// Port key (`8080/tcp`) to the host bindings for it.
    pub port_bindings: BTreeMap<String, Vec<PortBinding>>,
    pub mounts: Vec<Mount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartPolicy {
    pub name: String,
    pub maximum_retry_count: u32,
}

impl RestartPolicy {
    /// Render as the `--restart` value understood by the runtime.
    pub fn to_flag(&self) -> String {
        if self.name == "on-failure" && self.maximum_retry_count > 0 {
            format!("{}:{}", self.name, self.maximum_retry_count)
        } else {
            self.name.clone()
        }
    }
}

/// A host port binding. An empty `host_ip` binds every interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Bind,
}

impl MountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountKind::Bind => "bind",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub kind: MountKind,
    pub source: String,
    pub target: String,
}

/// Network attachments, keyed by network name with the network id as value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkingConfig {
    pub endpoints: BTreeMap<String, String>,
}

/// Lifecycle state as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Other(String),
}

impl ContainerState {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Running => f.write_str("running"),
            Self::Paused => f.write_str("paused"),
            Self::Restarting => f.write_str("restarting"),
            Self::Removing => f.write_str("removing"),
            Self::Exited => f.write_str("exited"),
            Self::Dead => f.write_str("dead"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// What `inspect` reports about an existing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub image: String,
    pub state: ContainerState,
}
