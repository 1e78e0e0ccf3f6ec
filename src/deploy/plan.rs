use std::collections::{BTreeMap, BTreeSet};

use crate::runtime::{
    ContainerConfig, HostConfig, Mount, MountKind, NetworkingConfig, PortBinding, RestartPolicy,
};

use super::types::DeployConfig;

/// Everything the runtime needs to create the container for a deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPlan {
    pub config: ContainerConfig,
    pub host: HostConfig,
    pub network: NetworkingConfig,
}

impl ContainerPlan {
    pub fn from_deploy(cfg: &DeployConfig) -> Self {
        let mut config = ContainerConfig {
            image: cfg.image_reference(),
            env: cfg.env.clone(),
            exposed_ports: BTreeSet::new(),
        };

        let mut host = HostConfig {
            auto_remove: cfg.auto_remove,
            restart_policy: RestartPolicy {
                name: cfg.restart_policy_name().to_string(),
                maximum_retry_count: cfg.restart_policy.maximum_retry_count,
            },
            port_bindings: BTreeMap::new(),
            mounts: Vec::new(),
        };

        // Applied only when present and non-empty.
        if let Some(ports) = cfg.ports.as_ref().filter(|p| !p.is_empty()) {
            for (container_port, host_port) in ports {
                let key = format!("{container_port}/tcp");
                config.exposed_ports.insert(key.clone());
                host.port_bindings.insert(
                    key,
                    vec![PortBinding {
                        host_ip: String::new(),
                        host_port: host_port.clone(),
                    }],
                );
            }
        }

        if let Some(mounts) = cfg.volume_mounts.as_ref().filter(|m| !m.is_empty()) {
            host.mounts = mounts
                .iter()
                .map(|(source, target)| Mount {
                    kind: MountKind::Bind,
                    source: source.clone(),
                    target: target.clone(),
                })
                .collect();
        }

        let mut network = NetworkingConfig::default();
        if !cfg.network_name.is_empty() && !cfg.network_id.is_empty() {
            network
                .endpoints
                .insert(cfg.network_name.clone(), cfg.network_id.clone());
        }

        Self {
            config,
            host,
            network,
        }
    }
}
