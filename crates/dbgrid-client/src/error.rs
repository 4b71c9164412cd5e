//! Client error types.

use dbgrid_core::BootstrapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("invalid tensor: {0}")]
    Tensor(String),

    #[error("no shard owns slot {0}")]
    NoSlotOwner(u16),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for BootstrapError {
    fn from(err: ClientError) -> Self {
        BootstrapError::dependency(err)
    }
}
