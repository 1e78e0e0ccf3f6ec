use std::fmt;

use serde::{Deserialize, Serialize};

/// Credentials used for `docker login` before the first image pull.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryAuth {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Registry host; Docker Hub when unset.
    pub server: Option<String>,
}

impl RegistryAuth {
    /// Username and password, only when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let user = self.username.as_deref().filter(|s| !s.is_empty())?;
        let pass = self.password.as_deref().filter(|s| !s.is_empty())?;
        Some((user, pass))
    }
}

// Keep the password out of logs.
impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("server", &self.server)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name or path of the docker CLI.
    pub docker_bin: String,
    /// Daemon endpoint exported as `DOCKER_HOST`; the CLI default when unset.
    pub docker_host: Option<String>,
    /// Upper bound in seconds for any single non-streaming docker call.
    pub docker_timeout: u64,
    pub registry: RegistryAuth,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            docker_host: None,
            docker_timeout: 300,
            registry: RegistryAuth::default(),
            log_filter: "info".to_string(),
        }
    }
}
