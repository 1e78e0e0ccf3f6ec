use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One stage of the replace-in-place sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployStep {
    Stop,
    Remove,
    Pull,
    Create,
    Start,
}

impl DeployStep {
    pub const ALL: [DeployStep; 5] = [
        DeployStep::Stop,
        DeployStep::Remove,
        DeployStep::Pull,
        DeployStep::Create,
        DeployStep::Start,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStep::Stop => "stop",
            DeployStep::Remove => "remove",
            DeployStep::Pull => "pull",
            DeployStep::Create => "create",
            DeployStep::Start => "start",
        }
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress reported by a deploy. The final event is always `Completed`
/// or `Aborted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployEvent {
    StepStarted(DeployStep),
    Log { step: DeployStep, line: String },
    /// `skipped` is set when stop/remove found nothing to act on.
    StepFinished { step: DeployStep, skipped: bool },
    Completed { container_id: String },
    Aborted { step: DeployStep, reason: String },
}

impl DeployEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployEvent::Completed { .. } | DeployEvent::Aborted { .. })
    }
}

/// Last known outcome of deploys for a service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStatus {
    /// Accepted, waiting for any earlier deploy of the same service.
    Queued,
    InProgress(DeployStep),
    Running { container_id: String },
    Failed { step: DeployStep, reason: String },
}

/// Shared stop flag for one deploy. The reconciler checks it before each
/// step and after each pull progress line; a runtime call already running
/// is left to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
