use std::time::Duration;

use crate::config::RegistryAuth;
use crate::runtime::{ContainerConfig, ContainerInfo, ContainerState, HostConfig, NetworkingConfig};

use super::types::DockerCommand;

/// `--format` template for `inspect`; fields are `|`-separated.
const INSPECT_FORMAT: &str = "{{.Id}}|{{.Config.Image}}|{{.State.Status}}";

pub fn stop_command(name: &str, timeout: Duration) -> DockerCommand {
    DockerCommand::new(vec!["stop".into(), name.into()], timeout)
}

pub fn remove_command(name: &str, force: bool, timeout: Duration) -> DockerCommand {
    let mut args = vec!["rm".to_string()];
    if force {
        args.push("-f".into());
    }
    args.push(name.into());
    DockerCommand::new(args, timeout)
}

pub fn pull_args(reference: &str) -> Vec<String> {
    vec!["pull".into(), reference.into()]
}

pub fn logs_args(name: &str) -> Vec<String> {
    vec!["logs".into(), name.into()]
}

/// Build a `docker create` command from the split runtime configuration.
pub fn create_command(
    name: &str,
    config: &ContainerConfig,
    host: &HostConfig,
    network: &NetworkingConfig,
    timeout: Duration,
) -> DockerCommand {
    let mut args = vec!["create".to_string(), "--name".into(), name.into()];

    for kv in &config.env {
        args.extend(["-e".into(), kv.clone()]);
    }

    if !host.restart_policy.name.is_empty() {
        args.extend(["--restart".into(), host.restart_policy.to_flag()]);
    }
    if host.auto_remove {
        args.push("--rm".into());
    }

    for port in &config.exposed_ports {
        args.extend(["--expose".into(), port.clone()]);
    }
    for (port, bindings) in &host.port_bindings {
        for b in bindings {
            let publish = if b.host_ip.is_empty() {
                format!("{}:{port}", b.host_port)
            } else {
                format!("{}:{}:{port}", b.host_ip, b.host_port)
            };
            args.extend(["-p".into(), publish]);
        }
    }

    for m in &host.mounts {
        let spec = [
            format!("type={}", m.kind.as_str()),
            csv_field(&format!("source={}", m.source)),
            csv_field(&format!("target={}", m.target)),
        ];
        args.extend(["--mount".into(), spec.join(",")]);
    }

    for network_id in network.endpoints.values() {
        args.extend(["--network".into(), network_id.clone()]);
    }

    args.push(config.image.clone());

    DockerCommand::new(args, timeout)
}

/// `--mount` is parsed as one CSV record; quote fields that would split it.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn start_command(id: &str, timeout: Duration) -> DockerCommand {
    DockerCommand::new(vec!["start".into(), id.into()], timeout)
}

pub fn restart_command(name: &str, timeout: Duration) -> DockerCommand {
    DockerCommand::new(vec!["restart".into(), name.into()], timeout)
}

pub fn inspect_command(name: &str, timeout: Duration) -> DockerCommand {
    DockerCommand::new(
        vec![
            "container".into(),
            "inspect".into(),
            "--format".into(),
            INSPECT_FORMAT.into(),
            name.into(),
        ],
        timeout,
    )
}

/// `docker login` with the password fed on stdin. `None` when no
/// credentials are configured.
pub fn login_command(auth: &RegistryAuth, timeout: Duration) -> Option<DockerCommand> {
    let (username, password) = auth.credentials()?;

    let mut args = vec![
        "login".to_string(),
        "--username".into(),
        username.to_string(),
        "--password-stdin".into(),
    ];
    if let Some(server) = auth.server.as_deref().filter(|s| !s.is_empty()) {
        args.push(server.to_string());
    }

    let mut cmd = DockerCommand::new(args, timeout);
    cmd.stdin = Some(password.to_string());
    Some(cmd)
}

/// Parse the output of [`inspect_command`].
pub fn parse_inspect(stdout: &str) -> Option<ContainerInfo> {
    let line = stdout.lines().find(|l| !l.trim().is_empty())?;
    let mut parts = line.trim().splitn(3, '|');
    let id = parts.next()?.to_string();
    let image = parts.next()?.to_string();
    let state = ContainerState::from_str_lossy(parts.next()?);
    if id.is_empty() {
        return None;
    }
    Some(ContainerInfo { id, image, state })
}
