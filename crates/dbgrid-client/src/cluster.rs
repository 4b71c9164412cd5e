//! Cluster slot map.

use std::collections::BTreeMap;

use crate::error::{ClientError, ClientResult};
use crate::resp::Value;

/// Slot ranges and the primary serving each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMap {
    /// start slot → (end slot inclusive, primary `host:port`)
    ranges: BTreeMap<u16, (u16, String)>,
}

impl SlotMap {
    /// Parse a `CLUSTER SLOTS` reply.
    ///
    /// Each entry is `[start, end, [host, port, id?, ...], replicas...]`.
    /// An empty host means "the node that answered", i.e. `seed_host`.
    pub fn from_cluster_slots(reply: &Value, seed_host: &str) -> ClientResult<Self> {
        let entries = reply
            .as_array()
            .ok_or_else(|| protocol("CLUSTER SLOTS reply is not an array"))?;

        let mut ranges = BTreeMap::new();
        for entry in entries {
            let fields = entry
                .as_array()
                .filter(|f| f.len() >= 3)
                .ok_or_else(|| protocol("slot range entry is malformed"))?;
            let start = slot_number(&fields[0])?;
            let end = slot_number(&fields[1])?;
            if end < start {
                return Err(protocol("slot range ends before it starts"));
            }

            let primary = fields[2]
                .as_array()
                .filter(|p| p.len() >= 2)
                .ok_or_else(|| protocol("slot range primary is malformed"))?;
            let host = primary[0]
                .as_str()
                .ok_or_else(|| protocol("primary host is not a string"))?;
            let host = if host.is_empty() { seed_host } else { host };
            let port = primary[1]
                .as_integer()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| protocol("primary port is invalid"))?;

            ranges.insert(start, (end, format!("{host}:{port}")));
        }
        Ok(Self { ranges })
    }

    /// Address of the primary serving `slot`.
    pub fn owner(&self, slot: u16) -> Option<&str> {
        self.ranges
            .range(..=slot)
            .next_back()
            .filter(|(_, (end, _))| slot <= *end)
            .map(|(_, (_, addr))| addr.as_str())
    }

    /// Distinct primaries, in slot order.
    pub fn primaries(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for (_, addr) in self.ranges.values() {
            if !seen.contains(&addr.as_str()) {
                seen.push(addr);
            }
        }
        seen
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// A `-MOVED` or `-ASK` redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Moved { slot: u16, address: String },
    Ask { slot: u16, address: String },
}

impl Redirect {
    /// Parse `MOVED <slot> <host:port>` / `ASK <slot> <host:port>`.
    pub fn parse(message: &str) -> Option<Self> {
        let mut parts = message.split_whitespace();
        let kind = parts.next()?;
        let slot = parts.next()?.parse().ok()?;
        let address = parts.next()?.to_string();
        match kind {
            "MOVED" => Some(Redirect::Moved { slot, address }),
            "ASK" => Some(Redirect::Ask { slot, address }),
            _ => None,
        }
    }
}

fn slot_number(value: &Value) -> ClientResult<u16> {
    value
        .as_integer()
        .and_then(|s| u16::try_from(s).ok())
        .filter(|s| *s < crate::slot::SLOT_COUNT)
        .ok_or_else(|| protocol("slot number out of range"))
}

fn protocol(msg: &str) -> ClientError {
    ClientError::Protocol(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(host: &str, port: i64) -> Value {
        Value::Array(vec![
            Value::Bulk(host.as_bytes().to_vec()),
            Value::Integer(port),
            Value::Bulk(b"09dbe9720cda62f7865eabc5fd8857c5d2678366".to_vec()),
        ])
    }

    fn range(start: i64, end: i64, primary: Value) -> Value {
        Value::Array(vec![Value::Integer(start), Value::Integer(end), primary])
    }

    fn three_way() -> SlotMap {
        let reply = Value::Array(vec![
            range(0, 5460, node("a.mcp", 6780)),
            range(5461, 10922, node("b.mcp", 6780)),
            range(10923, 16383, node("", 6780)),
        ]);
        SlotMap::from_cluster_slots(&reply, "seed.mcp").unwrap()
    }

    #[test]
    fn owner_lookup_at_boundaries() {
        let map = three_way();
        assert_eq!(map.owner(0), Some("a.mcp:6780"));
        assert_eq!(map.owner(5460), Some("a.mcp:6780"));
        assert_eq!(map.owner(5461), Some("b.mcp:6780"));
        assert_eq!(map.owner(16383), Some("seed.mcp:6780"));
    }

    #[test]
    fn uncovered_slot_has_no_owner() {
        let reply = Value::Array(vec![range(100, 200, node("a", 1))]);
        let map = SlotMap::from_cluster_slots(&reply, "seed").unwrap();
        assert_eq!(map.owner(99), None);
        assert_eq!(map.owner(150), Some("a:1"));
        assert_eq!(map.owner(201), None);
    }

    #[test]
    fn primaries_are_distinct() {
        let reply = Value::Array(vec![
            range(0, 10, node("a", 1)),
            range(11, 20, node("b", 1)),
            range(21, 30, node("a", 1)),
        ]);
        let map = SlotMap::from_cluster_slots(&reply, "seed").unwrap();
        assert_eq!(map.primaries(), ["a:1", "b:1"]);
    }

    #[test]
    fn malformed_replies_are_rejected() {
        assert!(SlotMap::from_cluster_slots(&Value::Integer(1), "s").is_err());
        let bad_port = Value::Array(vec![range(0, 1, node("a", 70000))]);
        assert!(SlotMap::from_cluster_slots(&bad_port, "s").is_err());
        let inverted = Value::Array(vec![range(9, 1, node("a", 1))]);
        assert!(SlotMap::from_cluster_slots(&inverted, "s").is_err());
        let too_high = Value::Array(vec![range(0, 16384, node("a", 1))]);
        assert!(SlotMap::from_cluster_slots(&too_high, "s").is_err());
    }

    #[test]
    fn redirect_parsing() {
        assert_eq!(
            Redirect::parse("MOVED 3999 127.0.0.1:6381"),
            Some(Redirect::Moved {
                slot: 3999,
                address: "127.0.0.1:6381".to_string()
            })
        );
        assert_eq!(
            Redirect::parse("ASK 12 b.mcp:6780"),
            Some(Redirect::Ask {
                slot: 12,
                address: "b.mcp:6780".to_string()
            })
        );
        assert_eq!(Redirect::parse("ERR unknown command"), None);
    }
}
