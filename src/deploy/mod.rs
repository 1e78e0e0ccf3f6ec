// Lifecycle reconciliation. Turns a DeployConfig into a running container.

mod events;
mod plan;
mod reconciler;
mod types;

pub use events::{CancelToken, DeployEvent, DeployStatus, DeployStep};
pub use plan::ContainerPlan;
pub use reconciler::{DeployError, Reconciler};
pub use types::{
    ConfigDecodeError, DEFAULT_IMAGE_TAG, DEFAULT_RESTART_POLICY, DeployConfig,
    RestartConfig, RestartPolicyConfig,
};
