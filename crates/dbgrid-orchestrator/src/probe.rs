//! Liveness probes for database shards.
//!
//! A shard counts as up once it answers an inline `PING` with the RESP
//! simple string `+PONG`.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

const PING: &[u8] = b"PING\r\n";
const PONG: &[u8] = b"+PONG\r\n";

/// Checks whether a shard at `host:port` is serving.
pub trait Prober: Send + Sync {
    fn ping(&self, address: &str) -> bool;
}

/// PING/PONG over a fresh TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct RespProber {
    timeout: Duration,
}

impl RespProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for RespProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl Prober for RespProber {
    fn ping(&self, address: &str) -> bool {
        let addr = match address.to_socket_addrs().map(|mut addrs| addrs.next()) {
            Ok(Some(addr)) => addr,
            Ok(None) => return false,
            Err(e) => {
                debug!(error = %e, %address, "probe address resolution failed");
                return false;
            }
        };

        let mut stream = match TcpStream::connect_timeout(&addr, self.timeout) {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %address, "probe connection failed");
                return false;
            }
        };
        if stream.set_read_timeout(Some(self.timeout)).is_err()
            || stream.set_write_timeout(Some(self.timeout)).is_err()
        {
            return false;
        }

        if stream.write_all(PING).is_err() {
            return false;
        }

        let mut reply = [0u8; PONG.len()];
        match stream.read_exact(&mut reply) {
            Ok(()) => reply == PONG,
            Err(e) => {
                debug!(error = %e, %address, "probe read failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(reply: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 6];
            conn.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, PING);
            conn.write_all(reply).unwrap();
        });
        addr
    }

    #[test]
    fn pong_is_alive() {
        let addr = serve_once(b"+PONG\r\n");
        assert!(RespProber::default().ping(&addr));
    }

    #[test]
    fn error_reply_is_not_alive() {
        let addr = serve_once(b"-LOADING\r\n");
        assert!(!RespProber::default().ping(&addr));
    }

    #[test]
    fn closed_port_is_not_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(!RespProber::new(Duration::from_millis(200)).ping(&addr));
    }
}
