// Container runtime capability: the operations the reconciler sequences.

mod error;
mod types;

use std::io::Read;

pub use error::RuntimeError;
pub use types::{
    ContainerConfig, ContainerInfo, ContainerState, HostConfig, Mount, MountKind,
    NetworkingConfig, PortBinding, RestartPolicy,
};

/// Byte stream handed back by long-running runtime calls (image pulls, logs).
pub type ByteStream = Box<dyn Read + Send>;

/// Operations a container engine must provide.
///
/// Implementations are shared across threads behind an `Arc` and must be
/// safe to call concurrently for different container names.
pub trait ContainerRuntime: Send + Sync {
    fn stop_container(&self, name: &str) -> Result<(), RuntimeError>;

    fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError>;

    /// Start pulling `reference`. Progress is streamed; the pull is only
    /// complete once the stream reaches EOF without an I/O error.
    fn pull_image(&self, reference: &str) -> Result<ByteStream, RuntimeError>;

    /// Create (but do not start) a container, returning its id.
    fn create_container(
        &self,
        name: &str,
        config: &ContainerConfig,
        host: &HostConfig,
        network: &NetworkingConfig,
    ) -> Result<String, RuntimeError>;

    fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    fn restart_container(&self, name: &str) -> Result<(), RuntimeError>;

    fn container_logs(&self, name: &str) -> Result<ByteStream, RuntimeError>;

    /// Look up a container by name. `Ok(None)` when it does not exist.
    fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError>;
}
