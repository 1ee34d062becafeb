//! Transport Module
//!
//! The byte-stream seam between the message pump and the UART.
//!
//! ## Implementations
//! - `DeviceTransport`: a character device such as `/dev/ttyS0`
//! - `TcpTransport`: a serial-over-TCP bridge, selected with `tcp://host:port`
//! - `sim::SimulatedTransport`: an in-process board for tests and dry runs
//!
//! Line settings (baud, raw mode, read timeout) belong to the UART driver;
//! the transport only moves bytes.

mod device;
mod tcp;

use std::io;

use crate::config::Config;
use crate::error::{LinkError, Result};

pub use device::DeviceTransport;
pub use tcp::TcpTransport;

/// Address prefix selecting the TCP bridge transport
pub const TCP_SCHEME: &str = "tcp://";

/// A bidirectional byte stream owned by the pump thread
pub trait Transport: Send {
    /// Read whatever arrives within the transport's read timeout.
    ///
    /// `Ok(0)` means nothing arrived in time. A closed or failed link is an
    /// error, never `Ok(0)`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `bytes` to the link
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Human-readable endpoint for logging
    fn describe(&self) -> String;
}

/// Open the transport named by `config.device`
pub fn open(config: &Config) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match config.device.strip_prefix(TCP_SCHEME) {
        Some(addr) => Box::new(TcpTransport::connect(addr, config.poll_interval())?),
        None => Box::new(DeviceTransport::open(&config.device, config.poll_interval())?),
    };

    tracing::info!(
        "Opened transport {} at {} bps",
        transport.describe(),
        config.baud_rate
    );
    Ok(transport)
}

/// Map read errors that only mean "nothing yet" to `Ok(0)`
pub(crate) fn idle_read(result: io::Result<usize>) -> io::Result<usize> {
    match result {
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            ) =>
        {
            Ok(0)
        }
        other => other,
    }
}

pub(crate) fn open_error(endpoint: &str, e: io::Error) -> LinkError {
    LinkError::Start(format!("cannot open {}: {}", endpoint, e))
}
