//! Process launching.
//!
//! [`ProcessLauncher`] is the seam between the orchestrator and whatever
//! actually starts programs. [`LocalLauncher`] spawns them from this host
//! with `std::process`; with `mpirun` as the program that is enough to
//! reach every node of the allocation.

use std::fs::File;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use tracing::debug;

use crate::error::{OrchestratorError, OrchestratorResult};

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the process.
    pub cwd: Option<PathBuf>,
    /// Stdout is redirected here when set.
    pub out: Option<PathBuf>,
    /// Stderr is redirected here when set.
    pub err: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            out: None,
            err: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn output(mut self, out: impl Into<PathBuf>, err: impl Into<PathBuf>) -> Self {
        self.out = Some(out.into());
        self.err = Some(err.into());
        self
    }

    /// The command line as a single display string.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitState {
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ExitState {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A launched process.
pub trait ProcessHandle: Send + std::fmt::Debug {
    fn pid(&self) -> Option<u32>;

    /// Non-blocking check for exit.
    fn try_wait(&mut self) -> std::io::Result<Option<ExitState>>;

    /// Terminate the process and reap it.
    fn kill(&mut self) -> std::io::Result<()>;
}

/// Starts processes described by a [`LaunchSpec`].
pub trait ProcessLauncher: Send + Sync {
    /// Start a long-running process.
    fn spawn(&self, spec: &LaunchSpec) -> OrchestratorResult<Box<dyn ProcessHandle>>;

    /// Run a process to completion.
    fn run(&self, spec: &LaunchSpec) -> OrchestratorResult<ExitState>;
}

/// Launches processes on this host.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

impl LocalLauncher {
    fn command(spec: &LaunchSpec) -> OrchestratorResult<Command> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(out) = &spec.out {
            let file = File::create(out)
                .map_err(OrchestratorError::io(format!("create {}", out.display())))?;
            cmd.stdout(file);
        }
        if let Some(err) = &spec.err {
            let file = File::create(err)
                .map_err(OrchestratorError::io(format!("create {}", err.display())))?;
            cmd.stderr(file);
        }
        Ok(cmd)
    }
}

impl ProcessLauncher for LocalLauncher {
    fn spawn(&self, spec: &LaunchSpec) -> OrchestratorResult<Box<dyn ProcessHandle>> {
        let child = Self::command(spec)?
            .spawn()
            .map_err(|source| OrchestratorError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        debug!(pid = child.id(), command = %spec.command_line(), "process spawned");
        Ok(Box::new(LocalProcess { child }))
    }

    fn run(&self, spec: &LaunchSpec) -> OrchestratorResult<ExitState> {
        debug!(command = %spec.command_line(), "running to completion");
        let status = Self::command(spec)?
            .status()
            .map_err(|source| OrchestratorError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        Ok(ExitState {
            code: status.code(),
        })
    }
}

#[derive(Debug)]
struct LocalProcess {
    child: Child,
}

impl ProcessHandle for LocalProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitState>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ExitState { code: status.code() }))
    }

    fn kill(&mut self) -> std::io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}
