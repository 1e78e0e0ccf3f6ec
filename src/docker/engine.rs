use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

use crate::config::CREDENTIAL_VARS;

/// Location of the docker binary and the daemon it should talk to.
#[derive(Debug, Clone)]
pub struct Engine {
    pub bin: String,
    pub host: Option<String>,
}

impl Engine {
    pub fn new(bin: impl Into<String>, host: Option<String>) -> Self {
        Self {
            bin: bin.into(),
            host,
        }
    }

    /// Base command with `DOCKER_HOST` applied when configured.
    ///
    /// Registry credentials are stripped so `docker create -e KEY` cannot
    /// copy them into a container.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        for var in CREDENTIAL_VARS {
            cmd.env_remove(var);
        }
        if let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) {
            cmd.env("DOCKER_HOST", host);
        }
        cmd
    }

    /// Verify that the Docker daemon is reachable.
    pub fn ensure_available(&self) -> Result<()> {
        let status = self
            .command()
            .args(["version", "--format", "{{.Server.Version}}"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to invoke `{}`; is it installed and on PATH?", self.bin))?;

        if !status.success() {
            bail!("docker daemon is not reachable (exit {})", status);
        }
        Ok(())
    }
}
