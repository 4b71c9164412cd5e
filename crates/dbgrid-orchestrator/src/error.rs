//! Orchestrator error types.

use std::path::PathBuf;

use dbgrid_core::{BootstrapError, Status};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid orchestrator configuration: {0}")]
    Config(String),

    #[error("run directory already exists: {}", .0.display())]
    AlreadyGenerated(PathBuf),

    #[error("run directory not generated: {}", .0.display())]
    NotGenerated(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cluster creation exited with code {code:?}")]
    ClusterCreate { code: Option<i32> },

    #[error("shard {address} entered status {status} during start")]
    ShardExited { address: String, status: Status },

    #[error("cluster not running after {polls} status polls")]
    StartTimeout { polls: u32 },

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl OrchestratorError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| OrchestratorError::Io { context, source }
    }
}

impl From<OrchestratorError> for BootstrapError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Config(msg) => BootstrapError::Configuration(msg),
            other => BootstrapError::dependency(other),
        }
    }
}
