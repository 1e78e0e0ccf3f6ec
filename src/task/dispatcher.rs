use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use thiserror::Error;
use tracing::{debug, info};

use crate::deploy::{CancelToken, ConfigDecodeError, DeployConfig, DeployEvent, Reconciler};

use super::types::Task;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] ConfigDecodeError),

    #[error("failed to start deploy worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Accepts deploy tasks and runs each on its own background thread.
pub struct Dispatcher {
    reconciler: Arc<Reconciler>,
}

impl Dispatcher {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Decode `task.Config` and start the deploy in the background.
    ///
    /// Returns once the request is accepted. Decode failures are returned
    /// here and never reach the runtime; anything that goes wrong later is
    /// only visible through logs, the returned handle, or
    /// [`Reconciler::status`]. `arguments` is accepted for callers that
    /// pass extra task arguments but does not influence the deploy.
    pub fn dispatch(
        &self,
        task: &Task,
        arguments: &[String],
    ) -> Result<DeployHandle, DispatchError> {
        let cfg = DeployConfig::from_value(task.config.clone())?;
        let service = cfg.service_name.clone();
        debug!(service = %service, ?arguments, "deploy task decoded");

        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let reconciler = Arc::clone(&self.reconciler);

        self.reconciler.mark_queued(&service);
        let spawned = std::thread::Builder::new()
            .name(format!("deploy-{service}"))
            .spawn(move || {
                // Outcome is logged and reported on `tx` by the reconciler.
                let _ = reconciler.deploy_with(&cfg, &worker_cancel, &tx);
            });
        if let Err(e) = spawned {
            self.reconciler.clear_status(&service);
            return Err(DispatchError::Spawn(e));
        }

        info!(service = %service, "deploy accepted");
        Ok(DeployHandle {
            service,
            events: rx,
            cancel,
        })
    }
}

/// Caller's view of a dispatched deploy. Dropping it detaches the deploy,
/// which then runs to completion unobserved.
pub struct DeployHandle {
    service: String,
    events: Receiver<DeployEvent>,
    cancel: CancelToken,
}

impl DeployHandle {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn events(&self) -> &Receiver<DeployEvent> {
        &self.events
    }

    /// Ask the deploy to stop at its next step boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the deploy finishes, returning its terminal event.
    /// `None` if the worker went away without reporting one.
    pub fn wait(self) -> Option<DeployEvent> {
        self.events.iter().find(DeployEvent::is_terminal)
    }

    /// Discard buffered progress without blocking.
    ///
    /// Returns `Some` once the deploy is over, holding the terminal event
    /// or `None` if the worker went away without one. Returns `None` while
    /// the deploy is still running.
    pub fn try_wait(&self) -> Option<Option<DeployEvent>> {
        loop {
            match self.events.try_recv() {
                Ok(event) if event.is_terminal() => return Some(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(None),
            }
        }
    }
}
