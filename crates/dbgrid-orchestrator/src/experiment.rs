//! Experiment — generate, start, poll, and stop an orchestrator.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use dbgrid_core::{GridConfig, Status};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::handle::{ClusterHandle, Shard};
use crate::launcher::{LocalLauncher, ProcessLauncher};
use crate::orchestrator::Orchestrator;
use crate::probe::{Prober, RespProber};

const MANIFEST_FILE: &str = "manifest.json";

/// Description of a generated run directory, written as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub experiment: String,
    pub orchestrator: String,
    pub port: u16,
    pub interface: String,
    pub run_command: String,
    pub shards: Vec<ShardManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardManifest {
    pub name: String,
    pub address: String,
    pub out: PathBuf,
    pub err: PathBuf,
}

impl RunManifest {
    pub fn read(run_dir: &Path) -> OrchestratorResult<Self> {
        let path = run_dir.join(MANIFEST_FILE);
        let bytes = std::fs::read(&path)
            .map_err(OrchestratorError::io(format!("read {}", path.display())))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Drives the lifecycle of orchestrators under one experiment directory.
pub struct Experiment {
    name: String,
    exp_dir: PathBuf,
    launcher: Box<dyn ProcessLauncher>,
    prober: Box<dyn Prober>,
    poll_interval: Duration,
    max_polls: u32,
}

impl Experiment {
    /// Create an experiment rooted at `<parent>/<name>`.
    pub fn new(name: impl Into<String>, parent: impl AsRef<Path>) -> Self {
        let name = name.into();
        let exp_dir = parent.as_ref().join(&name);
        Self {
            name,
            exp_dir,
            launcher: Box::new(LocalLauncher),
            prober: Box::new(RespProber::default()),
            poll_interval: Duration::from_secs(2),
            max_polls: 60,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(&config.experiment.name, &config.experiment.dir).with_polling(
            Duration::from_secs(config.orchestrator.poll_interval_secs),
            config.orchestrator.max_polls,
        )
    }

    pub fn with_launcher(mut self, launcher: Box<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_prober(mut self, prober: Box<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    /// Run directory used for `orc`.
    pub fn run_dir(&self, orc: &Orchestrator) -> PathBuf {
        self.exp_dir.join(orc.name())
    }

    /// Create the run directory for `orc` and write its manifest.
    ///
    /// An existing directory is removed when `overwrite` is set, and is
    /// an error otherwise.
    pub fn generate(&self, orc: &Orchestrator, overwrite: bool) -> OrchestratorResult<PathBuf> {
        let run_dir = self.run_dir(orc);
        if run_dir.exists() {
            if !overwrite {
                return Err(OrchestratorError::AlreadyGenerated(run_dir));
            }
            std::fs::remove_dir_all(&run_dir)
                .map_err(OrchestratorError::io(format!("remove {}", run_dir.display())))?;
            debug!(path = ?run_dir, "removed previous run directory");
        }
        std::fs::create_dir_all(&run_dir)
            .map_err(OrchestratorError::io(format!("create {}", run_dir.display())))?;

        let shards = orc
            .addresses()
            .into_iter()
            .enumerate()
            .map(|(i, address)| {
                let name = orc.shard_name(i);
                ShardManifest {
                    out: run_dir.join(format!("{name}.out")),
                    err: run_dir.join(format!("{name}.err")),
                    name,
                    address,
                }
            })
            .collect();
        let manifest = RunManifest {
            experiment: self.name.clone(),
            orchestrator: orc.name().to_string(),
            port: orc.port(),
            interface: orc.interface().to_string(),
            run_command: orc.run_command().to_string(),
            shards,
        };
        let path = run_dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(&manifest)?)
            .map_err(OrchestratorError::io(format!("write {}", path.display())))?;

        info!(path = ?run_dir, "run directory generated");
        Ok(run_dir)
    }

    /// Launch every shard of `orc` and return the handle.
    ///
    /// A multi-shard orchestrator always waits for its shards to answer,
    /// because the cluster can only be formed once they do. With `block`
    /// set, start also waits until every shard reports `Running`.
    pub fn start(&self, orc: &Orchestrator, block: bool) -> OrchestratorResult<ClusterHandle> {
        let run_dir = self.run_dir(orc);
        if !run_dir.is_dir() {
            return Err(OrchestratorError::NotGenerated(run_dir));
        }

        info!(hosts = ?orc.hosts().hosts(), port = orc.port(), "starting orchestrator");

        let mut shards = Vec::with_capacity(orc.db_nodes());
        for (i, address) in orc.addresses().into_iter().enumerate() {
            let spec = orc.shard_command(i, &run_dir);
            let process = self.launcher.spawn(&spec)?;
            debug!(%address, pid = ?process.pid(), "shard launched");
            shards.push(Shard {
                address,
                process,
                cancelled: false,
            });
        }
        let mut handle = ClusterHandle::new(orc.name().to_string(), run_dir.clone(), shards);

        if orc.is_clustered() {
            self.wait_running(&mut handle)?;
            let exit = self.launcher.run(&orc.cluster_create_command(&run_dir))?;
            if !exit.success() {
                return Err(OrchestratorError::ClusterCreate { code: exit.code });
            }
            info!(shards = orc.db_nodes(), "cluster formed");
        } else if block {
            self.wait_running(&mut handle)?;
        }

        Ok(handle)
    }

    /// Current status of every shard, in address order.
    pub fn get_status(&self, handle: &mut ClusterHandle) -> Vec<Status> {
        let prober = &self.prober;
        handle
            .shards
            .iter_mut()
            .map(|shard| ClusterHandle::shard_status(shard, |addr| prober.ping(addr)))
            .collect()
    }

    /// Kill every shard process. Returns the final statuses.
    ///
    /// Every shard is attempted even if one fails to die; the first
    /// failure is returned afterwards.
    pub fn stop(&self, mut handle: ClusterHandle) -> OrchestratorResult<Vec<Status>> {
        let mut first_err = None;
        for shard in &mut handle.shards {
            shard.cancelled = true;
            if let Err(e) = shard.process.kill() {
                warn!(error = %e, address = %shard.address, "failed to stop shard");
                if first_err.is_none() {
                    first_err = Some(OrchestratorError::Io {
                        context: format!("stop shard {}", shard.address),
                        source: e,
                    });
                }
            }
        }
        handle.stopped = true;
        info!(name = %handle.name, "orchestrator stopped");

        match first_err {
            Some(err) => Err(err),
            None => Ok(self.get_status(&mut handle)),
        }
    }

    fn wait_running(&self, handle: &mut ClusterHandle) -> OrchestratorResult<()> {
        for poll in 1..=self.max_polls {
            let statuses = self.get_status(handle);
            if let Some((address, status)) = handle
                .addresses()
                .into_iter()
                .zip(statuses.iter().copied())
                .find(|(_, s)| s.is_terminal())
            {
                return Err(OrchestratorError::ShardExited { address, status });
            }
            if statuses.iter().all(|s| *s == Status::Running) {
                debug!(poll, "all shards running");
                return Ok(());
            }
            debug!(poll, ?statuses, "waiting for shards");
            thread::sleep(self.poll_interval);
        }
        Err(OrchestratorError::StartTimeout {
            polls: self.max_polls,
        })
    }
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name)
            .field("exp_dir", &self.exp_dir)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}
