//! Node file parsing and host resolution.

use std::path::PathBuf;

use dbgrid_core::config::AllocationConfig;
use dbgrid_core::{ConfigSource, NodeList};
use tracing::{debug, info};

use crate::error::{AllocError, AllocResult};

/// Resolves database hosts from the node file named by a configuration source.
#[derive(Debug, Clone)]
pub struct AllocationReader {
    nodefile_var: String,
    host_suffix: String,
}

impl AllocationReader {
    pub fn new(nodefile_var: impl Into<String>, host_suffix: impl Into<String>) -> Self {
        Self {
            nodefile_var: nodefile_var.into(),
            host_suffix: host_suffix.into(),
        }
    }

    pub fn from_config(config: &AllocationConfig) -> Self {
        Self::new(&config.nodefile_var, &config.host_suffix)
    }

    /// Resolve the first `num_hosts` hosts of the allocation.
    ///
    /// Extra entries in the node file are dropped without warning.
    pub fn resolve<S: ConfigSource + ?Sized>(
        &self,
        source: &S,
        num_hosts: usize,
    ) -> AllocResult<NodeList> {
        let path = source
            .var(&self.nodefile_var)
            .map(PathBuf::from)
            .ok_or_else(|| AllocError::MissingVar(self.nodefile_var.clone()))?;

        let contents = std::fs::read_to_string(&path).map_err(|source| AllocError::Read {
            path: path.clone(),
            source,
        })?;

        let mut hosts = parse_nodefile(&contents, &self.host_suffix);
        debug!(?path, found = hosts.len(), "node file parsed");

        if hosts.len() < num_hosts {
            return Err(AllocError::Insufficient {
                found: hosts.len(),
                required: num_hosts,
            });
        }

        hosts.truncate(num_hosts);
        info!(hosts = ?hosts, "resolved allocation hosts");
        Ok(NodeList::new(hosts))
    }
}

impl Default for AllocationReader {
    fn default() -> Self {
        Self::from_config(&AllocationConfig::default())
    }
}

/// Parse node file contents: one hostname per line, surrounding
/// whitespace stripped, `suffix` appended.
pub fn parse_nodefile(contents: &str, suffix: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| format!("{}{suffix}", line.trim()))
        .collect()
}
