//! Allocation reader error types.

use std::path::PathBuf;

use dbgrid_core::BootstrapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocError {
    #[error("could not parse interactive allocation nodes: {0} is not set")]
    MissingVar(String),

    #[error("failed to read node file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("node file had {found} hosts, not {required}")]
    Insufficient { found: usize, required: usize },
}

pub type AllocResult<T> = Result<T, AllocError>;

impl From<AllocError> for BootstrapError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::Insufficient { found, required } => {
                BootstrapError::InsufficientResources { found, required }
            }
            other => BootstrapError::Configuration(other.to_string()),
        }
    }
}
