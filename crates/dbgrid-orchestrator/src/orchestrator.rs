//! Orchestrator definition — what to launch and where.

use std::path::{Path, PathBuf};

use dbgrid_core::NodeList;
use dbgrid_core::config::OrchestratorConfig;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::launcher::LaunchSpec;

/// A sharded database bound to a fixed set of hosts.
///
/// One shard runs per host, all on the same port.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    name: String,
    port: u16,
    interface: String,
    run_command: String,
    db_binary: String,
    cli_binary: String,
    modules: Vec<PathBuf>,
    protected_mode: bool,
    db_args: Vec<String>,
    hosts: NodeList,
}

impl Orchestrator {
    /// Validate `config` against `hosts` and build the definition.
    ///
    /// Only existing allocations are supported, so `batch` must be off.
    pub fn new(config: &OrchestratorConfig, hosts: NodeList) -> OrchestratorResult<Self> {
        if config.batch {
            return Err(OrchestratorError::Config(
                "batch launch is not supported; run inside an existing allocation".to_string(),
            ));
        }
        if config.db_nodes == 0 {
            return Err(OrchestratorError::Config(
                "db_nodes must be at least 1".to_string(),
            ));
        }
        if hosts.len() != config.db_nodes {
            return Err(OrchestratorError::Config(format!(
                "db_nodes is {} but {} hosts were given",
                config.db_nodes,
                hosts.len()
            )));
        }
        if config.port == 0 {
            return Err(OrchestratorError::Config("port must be non-zero".to_string()));
        }
        // Shards start in their run directory, possibly on another host.
        let modules = config
            .modules
            .iter()
            .map(|module| {
                std::path::absolute(module).map_err(|e| {
                    OrchestratorError::Config(format!(
                        "cannot resolve module path {}: {e}",
                        module.display()
                    ))
                })
            })
            .collect::<OrchestratorResult<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            port: config.port,
            interface: config.interface.clone(),
            run_command: config.run_command.clone(),
            db_binary: config.db_binary.clone(),
            cli_binary: config.cli_binary.clone(),
            modules,
            protected_mode: config.protected_mode,
            db_args: config.db_args.clone(),
            hosts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn run_command(&self) -> &str {
        &self.run_command
    }

    pub fn hosts(&self) -> &NodeList {
        &self.hosts
    }

    pub fn db_nodes(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_clustered(&self) -> bool {
        self.db_nodes() > 1
    }

    /// `host:port` of every shard, in host order.
    pub fn addresses(&self) -> Vec<String> {
        self.hosts
            .into_iter()
            .map(|host| format!("{host}:{}", self.port))
            .collect()
    }

    /// Name of shard `index`, used for its output files.
    pub fn shard_name(&self, index: usize) -> String {
        format!("{}_{index}", self.name)
    }

    /// Command that starts shard `index` from within `run_dir`.
    ///
    /// With an empty run command the database binary is started directly.
    pub fn shard_command(&self, index: usize, run_dir: &Path) -> LaunchSpec {
        let host = &self.hosts.hosts()[index];
        let shard = self.shard_name(index);

        let mut db_args = vec![
            "--port".to_string(),
            self.port.to_string(),
            "--protected-mode".to_string(),
            if self.protected_mode { "yes" } else { "no" }.to_string(),
        ];
        for module in &self.modules {
            db_args.push("--loadmodule".to_string());
            db_args.push(module.display().to_string());
        }
        if self.is_clustered() {
            db_args.extend([
                "--cluster-enabled".to_string(),
                "yes".to_string(),
                "--cluster-config-file".to_string(),
                format!("nodes-{shard}-{}.conf", self.port),
            ]);
        }
        db_args.extend(self.db_args.iter().cloned());

        let spec = if self.run_command.is_empty() {
            LaunchSpec::new(&self.db_binary).args(db_args)
        } else {
            LaunchSpec::new(&self.run_command)
                .args(["-np", "1", "--host", host.as_str()])
                .args(["--mca", "btl_tcp_if_include", self.interface.as_str()])
                .arg(&self.db_binary)
                .args(db_args)
        };

        spec.cwd(run_dir).output(
            run_dir.join(format!("{shard}.out")),
            run_dir.join(format!("{shard}.err")),
        )
    }

    /// Command that joins every shard into one cluster with no replicas.
    pub fn cluster_create_command(&self, run_dir: &Path) -> LaunchSpec {
        LaunchSpec::new(&self.cli_binary)
            .args(["--cluster", "create"])
            .args(self.addresses())
            .args(["--cluster-replicas", "0", "--cluster-yes"])
            .cwd(run_dir)
            .output(
                run_dir.join(format!("{}_create.out", self.name)),
                run_dir.join(format!("{}_create.err", self.name)),
            )
    }
}
