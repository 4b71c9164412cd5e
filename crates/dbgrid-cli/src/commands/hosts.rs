use clap::ValueEnum;
use dbgrid_alloc::AllocationReader;
use dbgrid_core::{BootstrapError, ConfigSource, GridConfig, NodeList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One host per line.
    Text,
    /// A JSON array of hosts.
    Json,
}

pub fn hosts(
    config: &GridConfig,
    source: &dyn ConfigSource,
    num: Option<usize>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let hosts = resolve(config, source, num)?;
    print!("{}", render(&hosts, format)?);
    Ok(())
}

fn render(hosts: &NodeList, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(hosts.hosts())?),
        OutputFormat::Text => hosts.into_iter().map(|host| format!("{host}\n")).collect(),
    })
}

fn resolve(
    config: &GridConfig,
    source: &dyn ConfigSource,
    num: Option<usize>,
) -> Result<NodeList, BootstrapError> {
    let num = num.unwrap_or(config.orchestrator.db_nodes);
    Ok(AllocationReader::from_config(&config.allocation).resolve(source, num)?)
}
