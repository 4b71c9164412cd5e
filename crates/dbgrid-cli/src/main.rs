use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dbgrid_core::{GridConfig, ProcessEnv};

mod commands;

#[derive(Parser)]
#[command(
    name = "dbgrid",
    about = "dbgrid — in-memory database clusters on HPC allocations",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Configuration file. Defaults apply when it does not exist.
    #[arg(short, long, global = true, default_value = "dbgrid.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a cluster on the current allocation, put and get one tensor,
    /// then stop the cluster.
    Run {
        #[command(flatten)]
        overrides: commands::run::Overrides,
        /// Key to store the tensor under.
        #[arg(long, default_value = "test")]
        key: String,
        /// Tensor values (comma separated, stored as INT64).
        #[arg(long, value_delimiter = ',', default_values_t = [1, 2, 3, 4])]
        values: Vec<i64>,
    },
    /// Resolve and print the hosts of the current allocation.
    Hosts {
        /// Number of hosts to resolve (default: orchestrator db_nodes).
        #[arg(short, long)]
        num: Option<usize>,
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = commands::hosts::OutputFormat::Text)]
        format: commands::hosts::OutputFormat,
    },
    /// Write a dbgrid.toml scaffold.
    Init {
        /// Experiment name.
        #[arg(long, default_value = "launch_cluster_db")]
        name: String,
        /// Number of database nodes.
        #[arg(short = 'n', long, default_value = "3")]
        db_nodes: usize,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dbgrid=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            overrides,
            key,
            values,
        } => {
            let mut config = GridConfig::load_or_default(&cli.config)?;
            overrides.apply(&mut config);
            commands::run::run(&config, &ProcessEnv, &key, &values)?;
            Ok(())
        }
        Commands::Hosts { num, format } => {
            let config = GridConfig::load_or_default(&cli.config)?;
            commands::hosts::hosts(&config, &ProcessEnv, num, format)
        }
        Commands::Init {
            name,
            db_nodes,
            force,
        } => commands::init::init(&cli.config, &name, db_nodes, force),
    }
}
