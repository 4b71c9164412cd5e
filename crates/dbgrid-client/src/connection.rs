//! Blocking RESP connection to one shard.

use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::resp::{self, Value};

/// One TCP connection speaking RESP2.
#[derive(Debug)]
pub struct Connection {
    address: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    /// Connect to `address` (`host:port`), trying each resolved address.
    pub fn open(
        address: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> ClientResult<Self> {
        let connect_err = |source: std::io::Error| ClientError::Connection {
            address: address.to_string(),
            source,
        };

        let mut last_err = None;
        let mut stream = None;
        for addr in address.to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = match (stream, last_err) {
            (Some(s), _) => s,
            (None, Some(e)) => return Err(connect_err(e)),
            (None, None) => {
                return Err(connect_err(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "address resolved to nothing",
                )));
            }
        };

        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(io_timeout))?;
        stream.set_write_timeout(Some(io_timeout))?;
        let writer = stream.try_clone()?;
        debug!(%address, "connection opened");

        Ok(Self {
            address: address.to_string(),
            reader: BufReader::new(stream),
            writer,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one command and read its reply. Server errors come back as
    /// [`Value::Error`], not `Err`.
    pub fn request(&mut self, args: &[&[u8]]) -> ClientResult<Value> {
        self.writer.write_all(&resp::encode_command(args))?;
        self.writer.flush()?;
        resp::read_value(&mut self.reader)
    }
}
