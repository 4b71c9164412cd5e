//! RESP2 encoding and decoding.
//!
//! ```text
//! +OK\r\n                    simple string
//! -ERR message\r\n           error
//! :42\r\n                    integer
//! $5\r\nhello\r\n            bulk string ($-1 is nil)
//! *2\r\n...                  array (*-1 is nil)
//! ```

use std::io::{BufRead, Read};

use crate::error::{ClientError, ClientResult};

/// Largest bulk string a server may send (matches the server's own cap).
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// A decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Vec<u8>),
    Array(Vec<Value>),
    Nil,
}

impl Value {
    /// Turn a server error reply into `Err`.
    pub fn into_result(self) -> ClientResult<Value> {
        match self {
            Value::Error(msg) => Err(ClientError::Server(msg)),
            other => Ok(other),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Simple(s) => Some(s.as_bytes()),
            Value::Bulk(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Encode a command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let payload: usize = args.iter().map(|a| a.len() + 16).sum();
    let mut out = Vec::with_capacity(payload + 16);
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Read one complete reply.
pub fn read_value<R: BufRead>(reader: &mut R) -> ClientResult<Value> {
    let line = read_line(reader)?;
    let (tag, rest) = line
        .split_first()
        .ok_or_else(|| ClientError::Protocol("empty reply line".to_string()))?;
    let text = || String::from_utf8_lossy(rest).into_owned();

    match tag {
        b'+' => Ok(Value::Simple(text())),
        b'-' => Ok(Value::Error(text())),
        b':' => Ok(Value::Integer(parse_int(rest)?)),
        b'$' => {
            let len = parse_int(rest)?;
            if len == -1 {
                return Ok(Value::Nil);
            }
            let len = checked_len(len)?;
            let mut buf = vec![0u8; len + 2];
            reader.read_exact(&mut buf)?;
            if !buf.ends_with(b"\r\n") {
                return Err(ClientError::Protocol(
                    "bulk string not terminated by CRLF".to_string(),
                ));
            }
            buf.truncate(len);
            Ok(Value::Bulk(buf))
        }
        b'*' => {
            let len = parse_int(rest)?;
            if len == -1 {
                return Ok(Value::Nil);
            }
            let len = checked_len(len)?;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(read_value(reader)?);
            }
            Ok(Value::Array(items))
        }
        other => Err(ClientError::Protocol(format!(
            "unknown reply type byte 0x{other:02x}"
        ))),
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> ClientResult<Vec<u8>> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(ClientError::Protocol("connection closed by server".to_string()));
    }
    if !line.ends_with(b"\r\n") {
        return Err(ClientError::Protocol("reply line not terminated by CRLF".to_string()));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn parse_int(digits: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ClientError::Protocol(format!(
                "invalid integer {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
}

fn checked_len(len: i64) -> ClientResult<usize> {
    usize::try_from(len)
        .ok()
        .filter(|l| *l <= MAX_BULK_LEN)
        .ok_or_else(|| ClientError::Protocol(format!("invalid length {len}")))
}
