pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::GridConfig;
pub use error::{BootstrapError, BootstrapResult};
pub use source::{ConfigSource, ProcessEnv};
pub use types::*;
