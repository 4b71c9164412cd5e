//! Boundary error taxonomy for a cluster bootstrap.
//!
//! Every failure is fatal. Library crates keep their own error enums and
//! convert into [`BootstrapError`] where they meet the caller.

use thiserror::Error;

/// Result type alias for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Errors surfaced to whoever drives the bootstrap flow.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Required configuration state is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The allocation holds fewer hosts than the cluster needs.
    #[error("allocation has {found} hosts, {required} required")]
    InsufficientResources { found: usize, required: usize },

    /// A failure raised by the orchestrator or the data-plane client.
    #[error("dependency error: {0:#}")]
    Dependency(#[source] anyhow::Error),
}

impl BootstrapError {
    /// Wrap an arbitrary dependency failure.
    pub fn dependency<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BootstrapError::Dependency(anyhow::Error::new(err))
    }
}
