//! dbgrid-alloc — discover the hosts of an interactive allocation.
//!
//! Schedulers that launch through `mpirun` (Cobalt, PBS) do not hand the
//! job a host list directly; they write one hostname per line into a node
//! file and export its path. This crate reads that file, rewrites each
//! hostname onto the high-bandwidth network by appending a domain suffix,
//! and keeps the first `N` entries.
//!
//! ```text
//! $COBALT_NODEFILE ──► read ──► trim lines ──► + ".mcp" ──► first N
//! ```

pub mod error;
pub mod reader;

pub use error::{AllocError, AllocResult};
pub use reader::{AllocationReader, parse_nodefile};
