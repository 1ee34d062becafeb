//! TCP Transport
//!
//! Serial-over-TCP bridge (ser2net and friends).

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{LinkError, Result};
use super::{idle_read, open_error, Transport};

/// Connect timeout for the bridge
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A UART reached through a TCP socket
pub struct TcpTransport {
    stream: TcpStream,
    peer_addr: String,
}

impl TcpTransport {
    /// Connect to `addr` (`host:port`); reads time out after `read_timeout`
    pub fn connect(addr: &str, read_timeout: Duration) -> Result<Self> {
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| open_error(addr, e))?
            .next()
            .ok_or_else(|| LinkError::Start(format!("cannot resolve {}", addr)))?;

        let stream =
            TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT).map_err(|e| open_error(addr, e))?;
        Self::from_stream(stream, read_timeout)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Frames are small; don't let Nagle hold them back
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(read_timeout))?;

        Ok(Self { stream, peer_addr })
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            // Timeouts surface as errors, so a zero-length read is the peer closing
            Ok(0) if !buf.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("bridge {} closed the connection", self.peer_addr),
            )),
            other => idle_read(other),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.peer_addr)
    }
}
