use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::app::SceneError;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Save,
    Load,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save => f.write_str("save"),
            Self::Load => f.write_str("load"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Converged,
    /// The wait ceiling elapsed; whatever was written or applied is kept.
    TimedOut,
    /// The operation aborted before reaching participants.
    Failed { reason: String },
}

/// How a finished save or load went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub kind: OperationKind,
    pub save_name: String,
    pub outcome: OperationOutcome,
    pub managed: usize,
    pub expected: usize,
    pub missing: Vec<String>,
    pub elapsed: Duration,
}

impl OperationReport {
    pub fn is_converged(&self) -> bool {
        self.outcome == OperationOutcome::Converged
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("cannot start a save while a {active} is in progress")]
    Busy { active: OperationKind },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to start the row writer thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot start a load while a {active} is in progress")]
    Busy { active: OperationKind },
    #[error("no save is available to load")]
    NoSave,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("failed to start the row reader thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}
