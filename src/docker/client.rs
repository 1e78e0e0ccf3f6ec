use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{Config, RegistryAuth};
use crate::runtime::{
    ByteStream, ContainerConfig, ContainerInfo, ContainerRuntime, HostConfig, NetworkingConfig,
    RuntimeError,
};

use super::commands;
use super::engine::Engine;
use super::run;
use super::types::{CommandOutput, DockerCommand};

/// [`ContainerRuntime`] backed by the `docker` CLI.
pub struct DockerCli {
    engine: Engine,
    timeout: Duration,
    registry: RegistryAuth,
    logged_in: Mutex<bool>,
}

impl DockerCli {
    pub fn new(cfg: &Config) -> Self {
        Self {
            engine: Engine::new(cfg.docker_bin.clone(), cfg.docker_host.clone()),
            timeout: Duration::from_secs(cfg.docker_timeout),
            registry: cfg.registry.clone(),
            logged_in: Mutex::new(false),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run `cmd` and turn a non-zero exit into a classified error.
    fn exec(&self, cmd: &DockerCommand) -> Result<CommandOutput, RuntimeError> {
        debug!(command = %cmd.display(), "docker");
        let output = run::run(&self.engine, cmd)?;
        if output.success {
            Ok(output)
        } else {
            Err(classify(&cmd.display(), output.exit_code, &output.stderr))
        }
    }

    /// Log in to the configured registry once per process.
    fn ensure_login(&self) -> Result<(), RuntimeError> {
        let Some(cmd) = commands::login_command(&self.registry, self.timeout) else {
            return Ok(());
        };

        let mut logged_in = self.logged_in.lock().unwrap_or_else(PoisonError::into_inner);
        if *logged_in {
            return Ok(());
        }
        self.exec(&cmd)?;
        info!(
            server = self.registry.server.as_deref().unwrap_or("docker.io"),
            "registry login succeeded"
        );
        *logged_in = true;
        Ok(())
    }
}

impl ContainerRuntime for DockerCli {
    fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.exec(&commands::stop_command(name, self.timeout)).map(drop)
    }

    fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        self.exec(&commands::remove_command(name, force, self.timeout)).map(drop)
    }

    fn pull_image(&self, reference: &str) -> Result<ByteStream, RuntimeError> {
        self.ensure_login()?;
        let stream = run::stream(&self.engine, &commands::pull_args(reference))?;
        Ok(Box::new(stream))
    }

    fn create_container(
        &self,
        name: &str,
        config: &ContainerConfig,
        host: &HostConfig,
        network: &NetworkingConfig,
    ) -> Result<String, RuntimeError> {
        let cmd = commands::create_command(name, config, host, network, self.timeout);
        let output = self.exec(&cmd)?;
        let id = output.stdout.trim().to_string();
        if id.is_empty() {
            return Err(RuntimeError::Failed {
                command: cmd.display(),
                code: output.exit_code,
                stderr: "no container id on stdout".into(),
            });
        }
        Ok(id)
    }

    fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.exec(&commands::start_command(id, self.timeout)).map(drop)
    }

    fn restart_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.exec(&commands::restart_command(name, self.timeout)).map(drop)
    }

    fn container_logs(&self, name: &str) -> Result<ByteStream, RuntimeError> {
        // `docker logs` only reports a missing container on its exit status.
        if self.inspect_container(name)?.is_none() {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        let stream = run::stream(&self.engine, &commands::logs_args(name))?;
        Ok(Box::new(stream))
    }

    fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        let cmd = commands::inspect_command(name, self.timeout);
        match self.exec(&cmd) {
            Ok(output) => Ok(commands::parse_inspect(&output.stdout)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Map a failed docker invocation onto the runtime error taxonomy using the
/// daemon's stderr message.
pub fn classify(command: &str, code: Option<i32>, stderr: &str) -> RuntimeError {
    let message = stderr.trim();
    let lower = message.to_ascii_lowercase();

    if lower.contains("no such container")
        || lower.contains("no such object")
        || lower.contains("no such image")
    {
        RuntimeError::NotFound(message.to_string())
    } else if lower.contains("conflict") || lower.contains("already in use") {
        RuntimeError::Conflict(message.to_string())
    } else {
        RuntimeError::Failed {
            command: command.to_string(),
            code,
            stderr: message.to_string(),
        }
    }
}
