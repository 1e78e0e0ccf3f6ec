use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::runtime::{ByteStream, ContainerInfo, ContainerRuntime, RuntimeError};

use super::events::{CancelToken, DeployEvent, DeployStatus, DeployStep};
use super::plan::ContainerPlan;
use super::types::{DeployConfig, RestartConfig};

/// Why a deploy attempt stopped short of a running container.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{step} failed: {source}")]
    Runtime {
        step: DeployStep,
        #[source]
        source: RuntimeError,
    },

    #[error("cancelled at {step}")]
    Cancelled { step: DeployStep },
}

impl DeployError {
    pub fn step(&self) -> DeployStep {
        match self {
            DeployError::Runtime { step, .. } | DeployError::Cancelled { step } => *step,
        }
    }
}

/// Sequences runtime calls that move a named container slot between
/// states. The runtime itself is the source of truth; the only local state
/// is a per-service lock and the last reported deploy status.
///
/// Lock entries live only while a deploy of that service runs or waits.
/// Status entries are kept for every service name ever deployed, so they
/// grow with the number of distinct names, not with the number of deploys.
pub struct Reconciler {
    runtime: Arc<dyn ContainerRuntime>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    statuses: Mutex<HashMap<String, DeployStatus>>,
}

impl Reconciler {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            locks: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    /// Replace whatever runs under `cfg.service_name` with a fresh container.
    pub fn deploy(&self, cfg: &DeployConfig) -> Result<String, DeployError> {
        // Nobody listens; sends on a closed channel are ignored.
        let (tx, _rx) = mpsc::channel();
        self.deploy_with(cfg, &CancelToken::new(), &tx)
    }

    /// Run stop → remove → pull → create → start once, reporting progress
    /// on `events`. Deploys of the same service name are serialized.
    ///
    /// Any runtime failure other than a missing container during stop or
    /// remove ends the attempt. Nothing is retried and completed steps are
    /// not undone, so a failed pull leaves the service absent.
    pub fn deploy_with(
        &self,
        cfg: &DeployConfig,
        cancel: &CancelToken,
        events: &Sender<DeployEvent>,
    ) -> Result<String, DeployError> {
        let service = cfg.service_name.as_str();
        let _span = info_span!("deploy", service).entered();

        let lock = self.service_lock(service);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let result = self.run_steps(cfg, cancel, events);
            self.record_outcome(cfg, &result, events);
            result
        };
        self.release_lock(service, lock);
        result
    }

    fn record_outcome(
        &self,
        cfg: &DeployConfig,
        result: &Result<String, DeployError>,
        events: &Sender<DeployEvent>,
    ) {
        let service = cfg.service_name.as_str();
        match result {
            Ok(container_id) => {
                info!(
                    container_id = %container_id,
                    image = %cfg.image_reference(),
                    "deploy complete"
                );
                self.set_status(
                    service,
                    DeployStatus::Running {
                        container_id: container_id.clone(),
                    },
                );
                let _ = events.send(DeployEvent::Completed {
                    container_id: container_id.clone(),
                });
            }
            Err(e) => {
                error!(step = %e.step(), error = %e, "deploy aborted");
                self.set_status(
                    service,
                    DeployStatus::Failed {
                        step: e.step(),
                        reason: e.to_string(),
                    },
                );
                let _ = events.send(DeployEvent::Aborted {
                    step: e.step(),
                    reason: e.to_string(),
                });
            }
        }
    }

    fn run_steps(
        &self,
        cfg: &DeployConfig,
        cancel: &CancelToken,
        events: &Sender<DeployEvent>,
    ) -> Result<String, DeployError> {
        let service = cfg.service_name.as_str();

        // ── Stop / remove the previous instance ──────────────────────────
        self.begin(service, DeployStep::Stop, cancel, events)?;
        let skipped = tolerate_missing(DeployStep::Stop, self.runtime.stop_container(service))?;
        let _ = events.send(DeployEvent::StepFinished {
            step: DeployStep::Stop,
            skipped,
        });

        self.begin(service, DeployStep::Remove, cancel, events)?;
        let skipped = tolerate_missing(
            DeployStep::Remove,
            self.runtime.remove_container(service, false),
        )?;
        let _ = events.send(DeployEvent::StepFinished {
            step: DeployStep::Remove,
            skipped,
        });

        // ── Pull ─────────────────────────────────────────────────────────
        self.begin(service, DeployStep::Pull, cancel, events)?;
        let reference = cfg.image_reference();
        let stream = self
            .runtime
            .pull_image(&reference)
            .map_err(failed_at(DeployStep::Pull))?;
        drain_progress(stream, cancel, events)?;
        let _ = events.send(DeployEvent::StepFinished {
            step: DeployStep::Pull,
            skipped: false,
        });

        // ── Create ───────────────────────────────────────────────────────
        self.begin(service, DeployStep::Create, cancel, events)?;
        let plan = ContainerPlan::from_deploy(cfg);
        let container_id = self
            .runtime
            .create_container(service, &plan.config, &plan.host, &plan.network)
            .map_err(failed_at(DeployStep::Create))?;
        debug!(container_id = %container_id, "container created");
        let _ = events.send(DeployEvent::StepFinished {
            step: DeployStep::Create,
            skipped: false,
        });

        // ── Start ────────────────────────────────────────────────────────
        // A container that never starts is removed again so the slot ends
        // up absent rather than holding a stopped instance.
        if let Err(e) = self.begin(service, DeployStep::Start, cancel, events) {
            self.discard(&container_id);
            return Err(e);
        }
        if let Err(source) = self.runtime.start_container(&container_id) {
            self.discard(&container_id);
            return Err(DeployError::Runtime {
                step: DeployStep::Start,
                source,
            });
        }
        let _ = events.send(DeployEvent::StepFinished {
            step: DeployStep::Start,
            skipped: false,
        });

        Ok(container_id)
    }

    fn begin(
        &self,
        service: &str,
        step: DeployStep,
        cancel: &CancelToken,
        events: &Sender<DeployEvent>,
    ) -> Result<(), DeployError> {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled { step });
        }
        info!(%step, "step started");
        self.set_status(service, DeployStatus::InProgress(step));
        let _ = events.send(DeployEvent::StepStarted(step));
        Ok(())
    }

    fn discard(&self, container_id: &str) {
        warn!(container_id, "removing container that was created but not started");
        if let Err(e) = self.runtime.remove_container(container_id, true) {
            warn!(container_id, error = %e, "failed to remove unstarted container");
        }
    }

    /// Restart an existing container. Errors come straight from the runtime.
    pub fn restart(&self, cfg: &RestartConfig) -> Result<(), RuntimeError> {
        info!(service = %cfg.service_name, "restarting container");
        self.runtime.restart_container(&cfg.service_name)
    }

    pub fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        info!(service = name, "stopping container");
        self.runtime.stop_container(name)
    }

    /// Force-remove, even when the container is running.
    pub fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        info!(service = name, "removing container");
        self.runtime.remove_container(name, true)
    }

    /// The container's stdout as a byte stream.
    pub fn logs(&self, name: &str) -> Result<ByteStream, RuntimeError> {
        self.runtime.container_logs(name)
    }

    /// Current runtime view of `name`, for callers polling a deploy.
    pub fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        self.runtime.inspect_container(name)
    }

    /// Last deploy status recorded for `service`, if any deploy was seen.
    pub fn status(&self, service: &str) -> Option<DeployStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .cloned()
    }

    /// Report a newly accepted deploy as queued, unless an earlier deploy
    /// of the same service is mid-flight and still owns the status.
    pub(crate) fn mark_queued(&self, service: &str) {
        let mut statuses = self.statuses.lock().unwrap_or_else(PoisonError::into_inner);
        match statuses.get(service) {
            Some(DeployStatus::InProgress(_)) => {}
            _ => {
                statuses.insert(service.to_string(), DeployStatus::Queued);
            }
        }
    }

    pub(crate) fn clear_status(&self, service: &str) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(service);
    }

    fn set_status(&self, service: &str, status: DeployStatus) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service.to_string(), status);
    }

    fn service_lock(&self, service: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(service.to_string()).or_default())
    }

    /// Drop the service's lock entry once no other deploy holds or waits on it.
    fn release_lock(&self, service: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(service);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn failed_at(step: DeployStep) -> impl FnOnce(RuntimeError) -> DeployError {
    move |source| DeployError::Runtime { step, source }
}

/// `Ok(true)` when the container was already gone.
fn tolerate_missing(
    step: DeployStep,
    result: Result<(), RuntimeError>,
) -> Result<bool, DeployError> {
    match result {
        Ok(()) => Ok(false),
        Err(e) if e.is_not_found() => {
            debug!(%step, "no existing container");
            Ok(true)
        }
        Err(source) => Err(DeployError::Runtime { step, source }),
    }
}

/// Forward pull progress line by line until the stream ends.
fn drain_progress(
    stream: ByteStream,
    cancel: &CancelToken,
    events: &Sender<DeployEvent>,
) -> Result<(), DeployError> {
    let reader = BufReader::new(stream);
    for chunk in reader.split(b'\n') {
        let chunk = chunk.map_err(|e| DeployError::Runtime {
            step: DeployStep::Pull,
            source: RuntimeError::Stream(e),
        })?;
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled {
                step: DeployStep::Pull,
            });
        }
        let line = String::from_utf8_lossy(&chunk).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        debug!(line = %line, "pull");
        let _ = events.send(DeployEvent::Log {
            step: DeployStep::Pull,
            line,
        });
    }
    Ok(())
}
