//! In-memory container runtime used by the integration tests.
//!
//! Models the create → start → stop → remove state machine per container
//! name, records every call, and can be told to fail or slow down specific
//! operations.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use service_launcher::runtime::{
    ByteStream, ContainerConfig, ContainerInfo, ContainerRuntime, ContainerState, HostConfig,
    NetworkingConfig, RuntimeError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Stop(String),
    Remove {
        name: String,
        force: bool,
    },
    Pull(String),
    Create {
        name: String,
        config: ContainerConfig,
        host: HostConfig,
        network: NetworkingConfig,
    },
    Start(String),
    Restart(String),
    Logs(String),
    Inspect(String),
}

impl Call {
    pub fn kind(&self) -> &'static str {
        match self {
            Call::Stop(_) => "stop",
            Call::Remove { .. } => "remove",
            Call::Pull(_) => "pull",
            Call::Create { .. } => "create",
            Call::Start(_) => "start",
            Call::Restart(_) => "restart",
            Call::Logs(_) => "logs",
            Call::Inspect(_) => "inspect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContainer {
    pub id: String,
    pub image: String,
    pub state: ContainerState,
}

#[derive(Default)]
struct State {
    /// Keyed by container name.
    containers: HashMap<String, FakeContainer>,
    calls: Vec<Call>,
    next_id: u32,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
    pull_latency: HashMap<String, Duration>,
    failing_pulls: HashSet<String>,
    broken_pull_streams: HashSet<String>,
    failing_stops: HashSet<String>,
    failing_creates: HashSet<String>,
    failing_starts: HashSet<String>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing container.
    pub fn with_container(self, name: &str, image: &str, state: ContainerState) -> Self {
        {
            let mut s = self.lock();
            s.next_id += 1;
            let id = format!("seed{:04}", s.next_id);
            s.containers.insert(
                name.to_string(),
                FakeContainer {
                    id,
                    image: image.to_string(),
                    state,
                },
            );
        }
        self
    }

    pub fn with_pull_latency(mut self, reference: &str, latency: Duration) -> Self {
        self.pull_latency.insert(reference.to_string(), latency);
        self
    }

    /// `pull_image` itself returns an error.
    pub fn failing_pull(mut self, reference: &str) -> Self {
        self.failing_pulls.insert(reference.to_string());
        self
    }

    /// `pull_image` succeeds but the stream errors after some progress.
    pub fn broken_pull_stream(mut self, reference: &str) -> Self {
        self.broken_pull_streams.insert(reference.to_string());
        self
    }

    pub fn failing_stop(mut self, name: &str) -> Self {
        self.failing_stops.insert(name.to_string());
        self
    }

    pub fn failing_create(mut self, name: &str) -> Self {
        self.failing_creates.insert(name.to_string());
        self
    }

    pub fn failing_start(mut self, name: &str) -> Self {
        self.failing_starts.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(Call::kind).collect()
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.lock().containers.get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }
}

/// Resolve a container by name or id to its name.
fn resolve(state: &State, key: &str) -> Option<String> {
    if state.containers.contains_key(key) {
        return Some(key.to_string());
    }
    state
        .containers
        .iter()
        .find(|(_, c)| c.id == key)
        .map(|(name, _)| name.clone())
}

fn no_such_container(key: &str) -> RuntimeError {
    RuntimeError::NotFound(format!("No such container: {key}"))
}

fn failed(command: String, stderr: &str) -> RuntimeError {
    RuntimeError::Failed {
        command,
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

/// Yields `prefix` and then fails.
struct BrokenStream {
    prefix: Cursor<Vec<u8>>,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.prefix.read(buf)?;
        if n == 0 {
            return Err(io::Error::other("unexpected EOF while downloading layer"));
        }
        Ok(n)
    }
}

impl ContainerRuntime for FakeRuntime {
    fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(Call::Stop(name.to_string()));
        if self.failing_stops.contains(name) {
            return Err(failed(format!("docker stop {name}"), "daemon is shutting down"));
        }
        let mut s = self.lock();
        let key = resolve(&s, name).ok_or_else(|| no_such_container(name))?;
        if let Some(c) = s.containers.get_mut(&key) {
            c.state = ContainerState::Exited;
        }
        Ok(())
    }

    fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        self.record(Call::Remove {
            name: name.to_string(),
            force,
        });
        let mut s = self.lock();
        let key = resolve(&s, name).ok_or_else(|| no_such_container(name))?;
        let running = s
            .containers
            .get(&key)
            .is_some_and(|c| c.state == ContainerState::Running);
        if running && !force {
            return Err(RuntimeError::Conflict(format!(
                "You cannot remove a running container {key}. Stop the container before attempting removal or force remove"
            )));
        }
        s.containers.remove(&key);
        Ok(())
    }

    fn pull_image(&self, reference: &str) -> Result<ByteStream, RuntimeError> {
        self.record(Call::Pull(reference.to_string()));
        if let Some(latency) = self.pull_latency.get(reference) {
            std::thread::sleep(*latency);
        }
        if self.failing_pulls.contains(reference) {
            return Err(failed(
                format!("docker pull {reference}"),
                "pull access denied, repository does not exist or may require 'docker login'",
            ));
        }
        if self.broken_pull_streams.contains(reference) {
            return Ok(Box::new(BrokenStream {
                prefix: Cursor::new(b"Pulling fs layer\n".to_vec()),
            }));
        }
        let progress = format!(
            "{reference}: Pulling from library\n\
             Digest: sha256:0123\n\
             Status: Downloaded newer image for {reference}\n"
        );
        Ok(Box::new(Cursor::new(progress.into_bytes())))
    }

    fn create_container(
        &self,
        name: &str,
        config: &ContainerConfig,
        host: &HostConfig,
        network: &NetworkingConfig,
    ) -> Result<String, RuntimeError> {
        self.record(Call::Create {
            name: name.to_string(),
            config: config.clone(),
            host: host.clone(),
            network: network.clone(),
        });
        if self.failing_creates.contains(name) {
            return Err(failed(format!("docker create --name {name}"), "invalid mount config"));
        }
        let mut s = self.lock();
        if s.containers.contains_key(name) {
            return Err(RuntimeError::Conflict(format!(
                "The container name \"/{name}\" is already in use"
            )));
        }
        s.next_id += 1;
        let id = format!("c{:04}", s.next_id);
        s.containers.insert(
            name.to_string(),
            FakeContainer {
                id: id.clone(),
                image: config.image.clone(),
                state: ContainerState::Created,
            },
        );
        Ok(id)
    }

    fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.record(Call::Start(id.to_string()));
        let mut s = self.lock();
        let key = resolve(&s, id).ok_or_else(|| no_such_container(id))?;
        if self.failing_starts.contains(&key) {
            return Err(failed(
                format!("docker start {id}"),
                "driver failed programming external connectivity: port is already allocated",
            ));
        }
        if let Some(c) = s.containers.get_mut(&key) {
            c.state = ContainerState::Running;
        }
        Ok(())
    }

    fn restart_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(Call::Restart(name.to_string()));
        let mut s = self.lock();
        let key = resolve(&s, name).ok_or_else(|| no_such_container(name))?;
        if let Some(c) = s.containers.get_mut(&key) {
            c.state = ContainerState::Running;
        }
        Ok(())
    }

    fn container_logs(&self, name: &str) -> Result<ByteStream, RuntimeError> {
        self.record(Call::Logs(name.to_string()));
        let s = self.lock();
        resolve(&s, name).ok_or_else(|| no_such_container(name))?;
        Ok(Box::new(Cursor::new(
            format!("{name} listening on :8080\n").into_bytes(),
        )))
    }

    fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        self.record(Call::Inspect(name.to_string()));
        let s = self.lock();
        Ok(resolve(&s, name).and_then(|key| {
            s.containers.get(&key).map(|c| ContainerInfo {
                id: c.id.clone(),
                image: c.image.clone(),
                state: c.state.clone(),
            })
        }))
    }
}
