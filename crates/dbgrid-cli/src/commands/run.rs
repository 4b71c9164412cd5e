//! `dbgrid run` — resolve hosts, start the cluster, exchange one tensor,
//! stop the cluster.
//!
//! Any failure aborts the flow where it happens. A cluster that was
//! already started is left running in that case.

use std::path::PathBuf;

use clap::Args;
use dbgrid_alloc::AllocationReader;
use dbgrid_client::{Client, ClientOptions, Tensor};
use dbgrid_core::{BootstrapError, BootstrapResult, ConfigSource, GridConfig, Status};
use dbgrid_orchestrator::{Experiment, Orchestrator};
use tracing::info;

/// Command-line overrides for values in dbgrid.toml.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Number of database nodes.
    #[arg(short = 'n', long)]
    pub db_nodes: Option<usize>,
    /// Port every shard listens on.
    #[arg(short, long)]
    pub port: Option<u16>,
    /// Network interface the shards communicate over.
    #[arg(long)]
    pub interface: Option<String>,
    /// Launcher used to reach the allocation's nodes (empty: run locally).
    #[arg(long)]
    pub run_command: Option<String>,
    /// Parent directory for generated run directories.
    #[arg(long)]
    pub exp_dir: Option<PathBuf>,
    /// Server module to load into every shard (repeatable; replaces the
    /// configured list).
    #[arg(long = "module")]
    pub modules: Vec<PathBuf>,
    /// Connect the client without cluster slot routing.
    #[arg(long)]
    pub no_cluster: bool,
}

impl Overrides {
    pub fn apply(self, config: &mut GridConfig) {
        if let Some(n) = self.db_nodes {
            config.orchestrator.db_nodes = n;
        }
        if let Some(port) = self.port {
            config.orchestrator.port = port;
        }
        if let Some(interface) = self.interface {
            config.orchestrator.interface = interface;
        }
        if let Some(run_command) = self.run_command {
            config.orchestrator.run_command = run_command;
        }
        if let Some(dir) = self.exp_dir {
            config.experiment.dir = dir;
        }
        if !self.modules.is_empty() {
            config.orchestrator.modules = self.modules;
        }
        if self.no_cluster {
            config.client.cluster = false;
        }
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Values read back from the database.
    pub returned: Vec<i64>,
    /// Shard statuses after stop.
    pub statuses: Vec<Status>,
}

pub fn run(
    config: &GridConfig,
    source: &dyn ConfigSource,
    key: &str,
    values: &[i64],
) -> BootstrapResult<()> {
    let exp = Experiment::from_config(config);
    run_with(&exp, config, source, key, values)?;
    Ok(())
}

/// The full flow, driven through `exp`.
pub fn run_with(
    exp: &Experiment,
    config: &GridConfig,
    source: &dyn ConfigSource,
    key: &str,
    values: &[i64],
) -> BootstrapResult<RunOutcome> {
    let hosts = AllocationReader::from_config(&config.allocation)
        .resolve(source, config.orchestrator.db_nodes)?;
    let orc = Orchestrator::new(&config.orchestrator, hosts)?;

    exp.generate(&orc, true)?;
    let mut handle = exp.start(&orc, true)?;
    info!(name = %handle.name(), run_dir = ?handle.run_dir(), "orchestrator running");

    let statuses = exp.get_status(&mut handle);
    info!(?statuses, "status of all database nodes");

    // One shard's address is enough; the client discovers the rest.
    let address = handle.addresses().into_iter().next().ok_or_else(|| {
        BootstrapError::Configuration("orchestrator started with no shards".to_string())
    })?;
    let returned = exchange_tensor(&address, client_options(config, &orc), key, values)?;

    let statuses = exp.stop(handle)?;
    info!(?statuses, "final status of all database nodes");
    Ok(RunOutcome { returned, statuses })
}

/// Client options for talking to `orc`.
///
/// A single shard is started without cluster support, so slot routing
/// is only used when the orchestrator forms a cluster.
pub fn client_options(config: &GridConfig, orc: &Orchestrator) -> ClientOptions {
    let mut options = ClientOptions::from(&config.client);
    options.cluster &= orc.is_clustered();
    options
}

/// Put `values` under `key` and read them back.
pub fn exchange_tensor(
    address: &str,
    options: ClientOptions,
    key: &str,
    values: &[i64],
) -> BootstrapResult<Vec<i64>> {
    let mut client = Client::with_options(address, options)?;

    let sent = Tensor::from_slice(values);
    info!(%key, ?values, "array put in database");
    client.put_tensor(key, &sent)?;

    let returned = client.get_tensor(key)?.to_vec::<i64>()?;
    info!(%key, values = ?returned, "array retrieved from database");
    Ok(returned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use dbgrid_client::Value;
    use dbgrid_client::resp::read_value;
    use dbgrid_orchestrator::{
        ExitState, LaunchSpec, OrchestratorResult, ProcessHandle, ProcessLauncher,
    };

    // ── Fake shard ──────────────────────────────────────────────────────

    type Tensors = Arc<Mutex<HashMap<Vec<u8>, Vec<Value>>>>;

    /// A database on 127.0.0.1 that stands in for every launched shard.
    /// With `cluster` set it owns all 16384 slots, otherwise it refuses
    /// cluster commands like a server started without cluster support.
    fn fake_shard(cluster: bool) -> (u16, Tensors) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let tensors = Tensors::default();
        let table = tensors.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let table = table.clone();
                thread::spawn(move || serve_conn(stream, port, cluster, &table));
            }
        });
        (port, tensors)
    }

    fn serve_conn(stream: TcpStream, port: u16, cluster: bool, tensors: &Tensors) {
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);
        loop {
            // Liveness checks send an inline PING.
            let inline = match reader.fill_buf() {
                Ok([]) | Err(_) => break,
                Ok(buf) => buf[0] != b'*',
            };
            let args: Vec<Vec<u8>> = if inline {
                let mut line = String::new();
                if reader.read_line(&mut line).is_err() {
                    break;
                }
                line.split_whitespace().map(|w| w.as_bytes().to_vec()).collect()
            } else {
                match read_value(&mut reader) {
                    Ok(Value::Array(items)) => items
                        .iter()
                        .map(|v| v.as_bytes().unwrap_or_default().to_vec())
                        .collect(),
                    _ => break,
                }
            };
            if args.is_empty() {
                continue;
            }
            let reply = dispatch(&args, port, cluster, &mut tensors.lock().unwrap());
            if writer.write_all(&encode(&reply)).is_err() {
                break;
            }
        }
    }

    fn dispatch(
        args: &[Vec<u8>],
        port: u16,
        cluster: bool,
        tensors: &mut HashMap<Vec<u8>, Vec<Value>>,
    ) -> Value {
        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        match name.as_str() {
            "PING" => Value::Simple("PONG".into()),
            "CLUSTER" if cluster => Value::Array(vec![Value::Array(vec![
                Value::Integer(0),
                Value::Integer(16383),
                Value::Array(vec![
                    Value::Bulk(b"127.0.0.1".to_vec()),
                    Value::Integer(port.into()),
                ]),
            ])]),
            "CLUSTER" => Value::Error("ERR This instance has cluster support disabled".into()),
            "AI.TENSORSET" => {
                let blob_at = args.iter().position(|a| a == b"BLOB").unwrap();
                let shape = args[3..blob_at]
                    .iter()
                    .map(|d| Value::Integer(String::from_utf8_lossy(d).parse().unwrap()))
                    .collect();
                tensors.insert(
                    args[1].clone(),
                    vec![
                        Value::Bulk(b"dtype".to_vec()),
                        Value::Bulk(args[2].clone()),
                        Value::Bulk(b"shape".to_vec()),
                        Value::Array(shape),
                        Value::Bulk(b"blob".to_vec()),
                        Value::Bulk(args[blob_at + 1].clone()),
                    ],
                );
                Value::Simple("OK".into())
            }
            "AI.TENSORGET" => match tensors.get(&args[1]) {
                Some(meta) => Value::Array(meta.clone()),
                None => Value::Error("ERR tensor key is empty".into()),
            },
            _ => Value::Error(format!("ERR unknown command '{name}'")),
        }
    }

    fn encode(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        match value {
            Value::Simple(s) => out.extend_from_slice(format!("+{s}\r\n").as_bytes()),
            Value::Error(s) => out.extend_from_slice(format!("-{s}\r\n").as_bytes()),
            Value::Integer(i) => out.extend_from_slice(format!(":{i}\r\n").as_bytes()),
            Value::Nil => out.extend_from_slice(b"$-1\r\n"),
            Value::Bulk(b) => {
                out.extend_from_slice(format!("${}\r\n", b.len()).as_bytes());
                out.extend_from_slice(b);
                out.extend_from_slice(b"\r\n");
            }
            Value::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    out.extend(encode(item));
                }
            }
        }
        out
    }

    // ── Recording launcher ─────────────────────────────────────────────

    #[derive(Debug)]
    struct IdleProcess {
        exit: Option<ExitState>,
    }

    impl ProcessHandle for IdleProcess {
        fn pid(&self) -> Option<u32> {
            None
        }

        fn try_wait(&mut self) -> std::io::Result<Option<ExitState>> {
            Ok(self.exit)
        }

        fn kill(&mut self) -> std::io::Result<()> {
            self.exit = Some(ExitState { code: None });
            Ok(())
        }
    }

    /// Records every launch without starting anything.
    #[derive(Clone, Default)]
    struct RecordingLauncher {
        spawned: Arc<Mutex<Vec<LaunchSpec>>>,
        ran: Arc<Mutex<Vec<LaunchSpec>>>,
    }

    impl ProcessLauncher for RecordingLauncher {
        fn spawn(&self, spec: &LaunchSpec) -> OrchestratorResult<Box<dyn ProcessHandle>> {
            self.spawned.lock().unwrap().push(spec.clone());
            Ok(Box::new(IdleProcess { exit: None }))
        }

        fn run(&self, spec: &LaunchSpec) -> OrchestratorResult<ExitState> {
            self.ran.lock().unwrap().push(spec.clone());
            Ok(ExitState { code: Some(0) })
        }
    }

    /// Config and environment for `nodes` shards that all resolve to the
    /// fake shard on `port`.
    fn local_setup(
        dir: &tempfile::TempDir,
        nodes: usize,
        port: u16,
    ) -> (GridConfig, HashMap<String, String>) {
        let nodefile = dir.path().join("nodes");
        std::fs::write(&nodefile, "127.0.0.1\n".repeat(nodes)).unwrap();
        let mut env = HashMap::new();
        env.insert(
            "COBALT_NODEFILE".to_string(),
            nodefile.to_string_lossy().into_owned(),
        );

        let mut config = GridConfig::default();
        config.experiment.dir = dir.path().to_path_buf();
        config.allocation.host_suffix = String::new();
        config.orchestrator.db_nodes = nodes;
        config.orchestrator.port = port;
        (config, env)
    }

    fn local_experiment(config: &GridConfig, launcher: &RecordingLauncher) -> Experiment {
        Experiment::from_config(config)
            .with_launcher(Box::new(launcher.clone()))
            .with_polling(Duration::ZERO, 5)
    }

    // ── Tests ───────────────────────────────────────────────────────────

    #[test]
    fn overrides_replace_only_given_values() {
        let mut config = GridConfig::default();
        Overrides {
            port: Some(7001),
            run_command: Some(String::new()),
            no_cluster: true,
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.orchestrator.port, 7001);
        assert_eq!(config.orchestrator.run_command, "");
        assert!(!config.client.cluster);
        assert_eq!(config.orchestrator.db_nodes, 3);
        assert_eq!(config.orchestrator.interface, "enp226s0");
    }

    #[test]
    fn run_without_nodefile_is_configuration_error() {
        let env: HashMap<String, String> = HashMap::new();
        let err = run(&GridConfig::default(), &env, "test", &[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration(_)));
    }

    #[test]
    fn run_with_too_few_hosts_is_insufficient() {
        let dir = tempfile::tempdir().unwrap();
        let nodefile = dir.path().join("nodes");
        std::fs::write(&nodefile, "a\nb\n").unwrap();
        let mut env = HashMap::new();
        env.insert(
            "COBALT_NODEFILE".to_string(),
            nodefile.to_string_lossy().into_owned(),
        );

        let mut config = GridConfig::default();
        config.experiment.dir = dir.path().to_path_buf();
        let err = run(&config, &env, "test", &[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::InsufficientResources {
                found: 2,
                required: 3
            }
        ));
        // Nothing was generated before the failure.
        assert!(!dir.path().join("launch_cluster_db").exists());
    }

    #[test]
    fn batch_mode_is_rejected_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let nodefile = dir.path().join("nodes");
        std::fs::write(&nodefile, "a\nb\nc\n").unwrap();
        let mut env = HashMap::new();
        env.insert(
            "COBALT_NODEFILE".to_string(),
            nodefile.to_string_lossy().into_owned(),
        );

        let mut config = GridConfig::default();
        config.experiment.dir = dir.path().to_path_buf();
        config.orchestrator.batch = true;
        let err = run(&config, &env, "test", &[1]).unwrap_err();
        assert!(matches!(err, BootstrapError::Configuration(_)));
    }

    #[test]
    fn exchange_against_unreachable_address_is_dependency_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = exchange_tensor(&addr, ClientOptions::default(), "test", &[1, 2, 3, 4])
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Dependency(_)));
    }

    #[test]
    fn full_flow_on_three_node_cluster() {
        let (port, tensors) = fake_shard(true);
        let dir = tempfile::tempdir().unwrap();
        let (config, env) = local_setup(&dir, 3, port);
        let launcher = RecordingLauncher::default();
        let exp = local_experiment(&config, &launcher);

        let outcome = run_with(&exp, &config, &env, "test", &[1, 2, 3, 4]).unwrap();

        assert_eq!(outcome.returned, [1, 2, 3, 4]);
        assert_eq!(outcome.statuses, [Status::Cancelled; 3]);
        assert!(tensors.lock().unwrap().contains_key(b"test".as_slice()));
        assert_eq!(launcher.spawned.lock().unwrap().len(), 3);
        let ran = launcher.ran.lock().unwrap();
        assert_eq!(ran.len(), 1);
        assert!(ran[0].args.contains(&"create".to_string()));
        assert!(dir.path().join("launch_cluster_db/orchestrator/manifest.json").is_file());
    }

    #[test]
    fn single_node_run_talks_to_standalone_server() {
        let (port, _tensors) = fake_shard(false);
        let dir = tempfile::tempdir().unwrap();
        let (config, env) = local_setup(&dir, 1, port);
        assert!(config.client.cluster);
        let launcher = RecordingLauncher::default();
        let exp = local_experiment(&config, &launcher);

        let outcome = run_with(&exp, &config, &env, "test", &[1, 2, 3, 4]).unwrap();

        assert_eq!(outcome.returned, [1, 2, 3, 4]);
        assert_eq!(outcome.statuses, [Status::Cancelled]);
        assert!(launcher.ran.lock().unwrap().is_empty());
    }

    #[test]
    fn client_options_follow_cluster_shape() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _env) = local_setup(&dir, 1, 6780);
        let hosts = |n: usize| dbgrid_core::NodeList::new(vec!["127.0.0.1".to_string(); n]);

        let single = Orchestrator::new(&config.orchestrator, hosts(1)).unwrap();
        assert!(!client_options(&config, &single).cluster);

        let mut config = config;
        config.orchestrator.db_nodes = 3;
        let clustered = Orchestrator::new(&config.orchestrator, hosts(3)).unwrap();
        assert!(client_options(&config, &clustered).cluster);

        config.client.cluster = false;
        assert!(!client_options(&config, &clustered).cluster);
    }
}
