// Error taxonomy for the pup manager and configuration patches

use thiserror::Error;

use crate::models::PupId;
use crate::patch::PatchState;

pub type PupResult<T> = Result<T, PupError>;

#[derive(Debug, Error)]
pub enum PupError {
    /// Unknown pup ID.
    #[error("pup not found: {0}")]
    NotFound(PupId),

    /// A pup with the same name, version and source is already installed.
    #[error("pup already exists: {existing_id}")]
    AlreadyExists { existing_id: PupId },

    /// IP or port space exhausted. Needs operator intervention; never retried.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Patch(#[from] PatchError),
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch already finalized (state: {0})")]
    AlreadyFinalized(PatchState),

    /// Snapshot failed before anything was touched.
    #[error("snapshot failed: {0}")]
    Snapshot(std::io::Error),

    #[error("operation {index} ({op}) failed: {source}")]
    Operation {
        index: usize,
        op: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rebuild failed: {0}")]
    Rebuild(String),

    /// Live config is in an unknown state. Fatal; must reach the operator.
    #[error("rollback failed after '{cause}': {rollback}")]
    RollbackFailed {
        cause: String,
        rollback: std::io::Error,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PatchError {
    /// True when the host configuration may be inconsistent.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PatchError::RollbackFailed { .. })
    }
}
