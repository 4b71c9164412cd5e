//! dbgrid-client — store and fetch tensors in a sharded in-memory database.
//!
//! Speaks RESP2 over blocking TCP. Tensors travel through the tensor
//! module commands (`AI.TENSORSET` / `AI.TENSORGET`) as a data type, a
//! shape, and a little-endian blob.
//!
//! # Cluster mode
//!
//! ```text
//! Client::connect(seed, cluster = true)
//!   ├── CLUSTER SLOTS on the seed → SlotMap (16384 slots → host:port)
//!   ├── key → CRC16 (XMODEM) mod 16384, honoring {hash tags}
//!   ├── lazily opened connection per shard
//!   └── -MOVED → refresh SlotMap, retry once
//!       -ASK   → ASKING + retry once on the target, map unchanged
//! ```
//!
//! Only one address is needed; the rest of the cluster is discovered.

pub mod client;
pub mod cluster;
pub mod connection;
pub mod error;
pub mod resp;
pub mod slot;
pub mod tensor;

pub use client::{Client, ClientOptions};
pub use error::{ClientError, ClientResult};
pub use resp::Value;
pub use tensor::{DataType, Tensor, TensorElement};
