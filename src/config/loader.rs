use std::path::Path;

use anyhow::{Context, Result};

use super::types::Config;

/// File looked up in the working directory.
pub const CONFIG_FILE: &str = ".launcher.yml";

/// Environment variables holding registry credentials. They are read once
/// here and never handed down to child processes.
pub const CREDENTIAL_VARS: [&str; 2] = ["DH_USERNAME", "DH_PASSWORD"];

/// Load config from [`CONFIG_FILE`] in `dir` (defaults when absent), then
/// apply overrides from the process environment.
pub fn load(dir: &Path) -> Result<Config> {
    let mut cfg = load_file(dir)?;
    apply_env(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

fn load_file(dir: &Path) -> Result<Config> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let config: Config =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Overlay environment variables on `cfg`. `lookup` abstracts the
/// environment so tests need not mutate process state.
pub fn apply_env(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(host) = lookup("DOCKER_HOST") {
        cfg.docker_host = Some(host);
    }
    if let Some(bin) = lookup("LAUNCHER_DOCKER_BIN") {
        cfg.docker_bin = bin;
    }
    if let Some(raw) = lookup("LAUNCHER_DOCKER_TIMEOUT") {
        cfg.docker_timeout = raw
            .trim()
            .parse()
            .with_context(|| format!("LAUNCHER_DOCKER_TIMEOUT must be seconds, got {raw:?}"))?;
    }
    if let Some(user) = lookup("DH_USERNAME") {
        cfg.registry.username = Some(user);
    }
    if let Some(pass) = lookup("DH_PASSWORD") {
        cfg.registry.password = Some(pass);
    }
    if let Some(server) = lookup("DH_SERVER") {
        cfg.registry.server = Some(server);
    }
    Ok(())
}
