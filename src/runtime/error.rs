use std::io;

use thiserror::Error;

/// Failure reported by (or while talking to) the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no such object: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("`{command}` failed (exit {code:?}): {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("failed to invoke runtime: {0}")]
    Spawn(#[source] io::Error),

    #[error("runtime stream error: {0}")]
    Stream(#[source] io::Error),
}

impl RuntimeError {
    /// True for the "object does not exist" subtype, which stop/remove
    /// during a deploy treat as success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}
