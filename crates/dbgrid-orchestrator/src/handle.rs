//! Cluster handle — exclusive ownership of a running cluster.

use std::path::{Path, PathBuf};

use dbgrid_core::Status;
use tracing::warn;

use crate::launcher::ProcessHandle;

/// One launched shard.
#[derive(Debug)]
pub(crate) struct Shard {
    pub(crate) address: String,
    pub(crate) process: Box<dyn ProcessHandle>,
    pub(crate) cancelled: bool,
}

/// A started cluster.
///
/// Not `Clone`: the process that started the cluster owns it and must
/// pass it to [`Experiment::stop`](crate::Experiment::stop). Dropping a
/// handle that was never stopped leaves the shards running.
#[derive(Debug)]
pub struct ClusterHandle {
    pub(crate) name: String,
    pub(crate) run_dir: PathBuf,
    pub(crate) shards: Vec<Shard>,
    pub(crate) stopped: bool,
}

impl ClusterHandle {
    pub(crate) fn new(name: String, run_dir: PathBuf, shards: Vec<Shard>) -> Self {
        Self {
            name,
            run_dir,
            shards,
            stopped: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// `host:port` of every shard. Any one of them reaches the whole cluster.
    pub fn addresses(&self) -> Vec<String> {
        self.shards.iter().map(|s| s.address.clone()).collect()
    }

    pub(crate) fn shard_status(shard: &mut Shard, alive: impl Fn(&str) -> bool) -> Status {
        match shard.process.try_wait() {
            Ok(Some(_)) if shard.cancelled => Status::Cancelled,
            Ok(Some(exit)) if exit.success() => Status::Completed,
            Ok(Some(_)) => Status::Failed,
            Ok(None) if shard.cancelled => Status::Cancelled,
            Ok(None) if alive(&shard.address) => Status::Running,
            Ok(None) => Status::New,
            Err(e) => {
                warn!(error = %e, address = %shard.address, "could not poll shard process");
                Status::Failed
            }
        }
    }
}

impl Drop for ClusterHandle {
    fn drop(&mut self) {
        if !self.stopped && !self.shards.is_empty() {
            warn!(
                name = %self.name,
                shards = self.shards.len(),
                "cluster handle dropped without stop; shard processes left running"
            );
        }
    }
}
