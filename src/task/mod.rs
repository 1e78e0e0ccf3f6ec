// Task dispatch: decode a task envelope and hand the deploy to a worker.

mod dispatcher;
mod types;

pub use dispatcher::{DeployHandle, DispatchError, Dispatcher};
pub use types::Task;
