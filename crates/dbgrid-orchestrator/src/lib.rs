//! dbgrid-orchestrator — launch a sharded in-memory database on an
//! existing allocation.
//!
//! # Architecture
//!
//! ```text
//! Experiment
//!   ├── generate(orc)  → <exp_dir>/<experiment>/<orchestrator>/manifest.json
//!   ├── start(orc)     → one process per host via ProcessLauncher
//!   │                    → wait for PING on every shard (Prober)
//!   │                    → form the cluster (db_nodes > 1)
//!   │                    → ClusterHandle
//!   ├── get_status(&mut handle) → Vec<Status>
//!   └── stop(handle)   → kill every shard process
//! ```
//!
//! The handle is single-owner: whoever started the cluster stops it.
//! Nothing here retries a failed launch or cleans up a partial one.

pub mod error;
pub mod experiment;
pub mod handle;
pub mod launcher;
pub mod orchestrator;
pub mod probe;

pub use error::{OrchestratorError, OrchestratorResult};
pub use experiment::{Experiment, RunManifest};
pub use handle::ClusterHandle;
pub use launcher::{ExitState, LaunchSpec, LocalLauncher, ProcessHandle, ProcessLauncher};
pub use orchestrator::Orchestrator;
pub use probe::{Prober, RespProber};
