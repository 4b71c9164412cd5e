//! dbgrid.toml configuration parser.
//!
//! Every section is optional. Defaults reproduce a three-node cluster on
//! a Cobalt allocation reached over the `.mcp` high-bandwidth network.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NODEFILE_VAR: &str = "COBALT_NODEFILE";
pub const DEFAULT_HOST_SUFFIX: &str = ".mcp";
pub const DEFAULT_PORT: u16 = 6780;
pub const DEFAULT_DB_NODES: usize = 3;
pub const DEFAULT_INTERFACE: &str = "enp226s0";
pub const DEFAULT_RUN_COMMAND: &str = "mpirun";
pub const DEFAULT_TENSOR_MODULE: &str = "redisai.so";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub name: String,
    /// Parent directory for generated run directories.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Variable holding the path of the scheduler's node file.
    pub nodefile_var: String,
    /// Appended to every hostname read from the node file.
    pub host_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub name: String,
    pub port: u16,
    pub db_nodes: usize,
    pub interface: String,
    pub run_command: String,
    /// Submit a new batch job instead of using the current allocation.
    pub batch: bool,
    pub db_binary: String,
    pub cli_binary: String,
    /// Server modules loaded into every shard. Relative paths resolve
    /// against the directory `dbgrid` is started from.
    pub modules: Vec<PathBuf>,
    /// Keep the server's protected mode on. Shards are reached from other
    /// hosts, so this is normally off.
    pub protected_mode: bool,
    /// Extra arguments appended to every shard's server command line.
    pub db_args: Vec<String>,
    /// Seconds between status polls while blocking on start.
    pub poll_interval_secs: u64,
    /// Polls before start gives up waiting for the cluster.
    pub max_polls: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cluster: bool,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "launch_cluster_db".to_string(),
            dir: PathBuf::from("."),
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            nodefile_var: DEFAULT_NODEFILE_VAR.to_string(),
            host_suffix: DEFAULT_HOST_SUFFIX.to_string(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: "orchestrator".to_string(),
            port: DEFAULT_PORT,
            db_nodes: DEFAULT_DB_NODES,
            interface: DEFAULT_INTERFACE.to_string(),
            run_command: DEFAULT_RUN_COMMAND.to_string(),
            batch: false,
            db_binary: "redis-server".to_string(),
            cli_binary: "redis-cli".to_string(),
            modules: vec![PathBuf::from(DEFAULT_TENSOR_MODULE)],
            protected_mode: false,
            db_args: Vec::new(),
            poll_interval_secs: 2,
            max_polls: 60,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cluster: true,
            connect_timeout_ms: 5_000,
            io_timeout_ms: 30_000,
        }
    }
}

impl GridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GridConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Read `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config for an experiment of the given name and size.
    pub fn scaffold(name: &str, db_nodes: usize) -> Self {
        let mut config = GridConfig::default();
        config.experiment.name = name.to_string();
        config.orchestrator.db_nodes = db_nodes;
        config
    }
}
