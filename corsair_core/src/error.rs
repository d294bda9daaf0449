//! Errors surfaced by the worker runtime.

use corsair_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Gateway failure outside the loops (e.g. the startup announcement)
    #[error(transparent)]
    Env(#[from] EnvError),

    /// The fabric sent a fatal log message; the process must terminate.
    #[error("Fatal error from fabric: {0}")]
    RemoteFatal(String),

    /// A loop task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl WorkerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::RemoteFatal(_))
    }
}
