//! Client — tensor put/get against a standalone or clustered database.

use std::collections::HashMap;
use std::time::Duration;

use dbgrid_core::config::ClientConfig;
use tracing::{debug, info};

use crate::cluster::{Redirect, SlotMap};
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::resp::Value;
use crate::slot::key_slot;
use crate::tensor::{DataType, Tensor};

/// Connection options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub cluster: bool,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            cluster: config.cluster,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            io_timeout: Duration::from_millis(config.io_timeout_ms),
        }
    }
}

enum Mode {
    Standalone(Connection),
    Cluster {
        seed: String,
        slots: SlotMap,
        conns: HashMap<String, Connection>,
    },
}

/// Data-plane client bound to one database address.
pub struct Client {
    mode: Mode,
    options: ClientOptions,
}

impl Client {
    /// Connect to `address` (`host:port`); in cluster mode the rest of
    /// the cluster is discovered from it.
    pub fn connect(address: &str, cluster: bool) -> ClientResult<Self> {
        Self::with_options(
            address,
            ClientOptions {
                cluster,
                ..Default::default()
            },
        )
    }

    pub fn with_options(address: &str, options: ClientOptions) -> ClientResult<Self> {
        let mut conn = Connection::open(address, options.connect_timeout, options.io_timeout)?;
        let mode = if options.cluster {
            let slots = fetch_slots(&mut conn)?;
            debug!(primaries = ?slots.primaries(), "cluster slot map loaded");
            let mut conns = HashMap::new();
            conns.insert(address.to_string(), conn);
            Mode::Cluster {
                seed: address.to_string(),
                slots,
                conns,
            }
        } else {
            Mode::Standalone(conn)
        };
        info!(%address, cluster = options.cluster, "client connected");
        Ok(Self { mode, options })
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self.mode, Mode::Cluster { .. })
    }

    /// Store `tensor` under `key`, replacing any previous value.
    pub fn put_tensor(&mut self, key: &str, tensor: &Tensor) -> ClientResult<()> {
        let dims: Vec<String> = tensor.shape().iter().map(usize::to_string).collect();
        let mut args: Vec<&[u8]> = Vec::with_capacity(dims.len() + 5);
        args.push(b"AI.TENSORSET");
        args.push(key.as_bytes());
        args.push(tensor.dtype().as_str().as_bytes());
        args.extend(dims.iter().map(|d| d.as_bytes()));
        args.push(b"BLOB");
        args.push(tensor.blob());

        let reply = self.execute(key, &args)?.into_result()?;
        expect_ok(&reply)?;
        debug!(%key, dtype = %tensor.dtype(), shape = ?tensor.shape(), "tensor stored");
        Ok(())
    }

    /// Fetch the tensor stored under `key`.
    pub fn get_tensor(&mut self, key: &str) -> ClientResult<Tensor> {
        let reply = self
            .execute(key, &[b"AI.TENSORGET", key.as_bytes(), b"META", b"BLOB"])?
            .into_result()
            .map_err(|err| match err {
                ClientError::Server(msg) if is_missing_key(&msg) => {
                    ClientError::KeyNotFound(key.to_string())
                }
                other => other,
            })?;
        let tensor = parse_tensor_reply(&reply)?;
        debug!(%key, dtype = %tensor.dtype(), shape = ?tensor.shape(), "tensor fetched");
        Ok(tensor)
    }

    /// Whether `key` holds a value.
    pub fn key_exists(&mut self, key: &str) -> ClientResult<bool> {
        let reply = self.execute(key, &[b"EXISTS", key.as_bytes()])?.into_result()?;
        reply
            .as_integer()
            .map(|n| n > 0)
            .ok_or_else(|| ClientError::Protocol(format!("unexpected EXISTS reply {reply:?}")))
    }

    /// Remove `key`. Returns whether it existed.
    pub fn delete_tensor(&mut self, key: &str) -> ClientResult<bool> {
        let reply = self.execute(key, &[b"DEL", key.as_bytes()])?.into_result()?;
        reply
            .as_integer()
            .map(|n| n > 0)
            .ok_or_else(|| ClientError::Protocol(format!("unexpected DEL reply {reply:?}")))
    }

    /// Route a single-key command to the shard owning `key`.
    fn execute(&mut self, key: &str, args: &[&[u8]]) -> ClientResult<Value> {
        let options = self.options;
        match &mut self.mode {
            Mode::Standalone(conn) => conn.request(args),
            Mode::Cluster { slots, conns, .. } => {
                let slot = key_slot(key.as_bytes());
                let owner = slots
                    .owner(slot)
                    .ok_or(ClientError::NoSlotOwner(slot))?
                    .to_string();
                let reply = shard(conns, &owner, options)?.request(args)?;

                let redirect = match &reply {
                    Value::Error(msg) => Redirect::parse(msg),
                    _ => None,
                };
                match redirect {
                    None => Ok(reply),
                    Some(Redirect::Moved { slot, address }) => {
                        info!(slot, from = %owner, to = %address, "slot moved, refreshing map");
                        let target = shard(conns, &address, options)?;
                        *slots = fetch_slots(target)?;
                        target.request(args)
                    }
                    Some(Redirect::Ask { slot, address }) => {
                        debug!(slot, to = %address, "following ASK redirect");
                        let target = shard(conns, &address, options)?;
                        target.request(&[b"ASKING"])?.into_result()?;
                        target.request(args)
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Client");
        match &self.mode {
            Mode::Standalone(conn) => s.field("address", &conn.address()),
            Mode::Cluster { seed, slots, .. } => s
                .field("seed", seed)
                .field("primaries", &slots.primaries()),
        };
        s.finish()
    }
}

/// Connection to `address`, opened on first use.
fn shard<'a>(
    conns: &'a mut HashMap<String, Connection>,
    address: &str,
    options: ClientOptions,
) -> ClientResult<&'a mut Connection> {
    if !conns.contains_key(address) {
        let conn = Connection::open(address, options.connect_timeout, options.io_timeout)?;
        conns.insert(address.to_string(), conn);
    }
    conns
        .get_mut(address)
        .ok_or_else(|| ClientError::Protocol(format!("connection to {address} vanished")))
}

fn fetch_slots(conn: &mut Connection) -> ClientResult<SlotMap> {
    let reply = conn.request(&[b"CLUSTER", b"SLOTS"])?.into_result()?;
    let seed_host = conn
        .address()
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(conn.address());
    let slots = SlotMap::from_cluster_slots(&reply, seed_host)?;
    if slots.is_empty() {
        return Err(ClientError::Protocol(
            "cluster reports no slot assignments".to_string(),
        ));
    }
    Ok(slots)
}

fn expect_ok(reply: &Value) -> ClientResult<()> {
    match reply {
        Value::Simple(s) if s == "OK" => Ok(()),
        other => Err(ClientError::Protocol(format!("expected OK, got {other:?}"))),
    }
}

fn is_missing_key(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("empty") || msg.contains("does not exist") || msg.contains("not found")
}

/// Parse `[dtype, <name>, shape, [dims..], blob, <bytes>]`.
fn parse_tensor_reply(reply: &Value) -> ClientResult<Tensor> {
    let fields = reply
        .as_array()
        .ok_or_else(|| ClientError::Protocol(format!("unexpected AI.TENSORGET reply {reply:?}")))?;

    let mut dtype = None;
    let mut shape = None;
    let mut blob = None;
    for pair in fields.chunks_exact(2) {
        let name = pair[0].as_str().map(str::to_ascii_lowercase);
        match name.as_deref() {
            Some("dtype") => {
                let name = pair[1]
                    .as_str()
                    .ok_or_else(|| ClientError::Protocol("dtype is not a string".to_string()))?;
                dtype = Some(DataType::from_name(name).ok_or_else(|| {
                    ClientError::Tensor(format!("unsupported data type {name}"))
                })?);
            }
            Some("shape") => {
                let dims = pair[1]
                    .as_array()
                    .ok_or_else(|| ClientError::Protocol("shape is not an array".to_string()))?
                    .iter()
                    .map(|d| {
                        d.as_integer()
                            .and_then(|n| usize::try_from(n).ok())
                            .ok_or_else(|| ClientError::Protocol(format!("bad dimension {d:?}")))
                    })
                    .collect::<ClientResult<Vec<usize>>>()?;
                shape = Some(dims);
            }
            Some("blob") => {
                let bytes = pair[1]
                    .as_bytes()
                    .ok_or_else(|| ClientError::Protocol("blob is not a string".to_string()))?;
                blob = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    match (dtype, shape, blob) {
        (Some(dtype), Some(shape), Some(blob)) => Tensor::from_raw(dtype, shape, blob),
        _ => Err(ClientError::Protocol(
            "AI.TENSORGET reply missing dtype, shape or blob".to_string(),
        )),
    }
}
