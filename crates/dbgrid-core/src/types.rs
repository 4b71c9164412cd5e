//! Shared types used across dbgrid crates.

use serde::{Deserialize, Serialize};

/// Ordered hostnames resolved from an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeList(Vec<String>);

impl NodeList {
    pub fn new(hosts: Vec<String>) -> Self {
        NodeList(hosts)
    }

    pub fn hosts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Lifecycle status of one database node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Launched but not yet answering.
    New,
    /// Process alive and answering on its port.
    Running,
    /// Process exited cleanly.
    Completed,
    /// Process exited with an error or could not be probed.
    Failed,
    /// Stopped by the orchestrator.
    Cancelled,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::New => "New",
            Status::Running => "Running",
            Status::Completed => "Completed",
            Status::Failed => "Failed",
            Status::Cancelled => "Cancelled",
        }
    }

    /// Whether the node has reached a state it will not leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
