//! Configuration for boardlink
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{LinkError, Result};

/// Highest protocol version the 5-bit status field can carry
pub const MAX_PROTOCOL_VERSION: u8 = 0x1F;

/// Main configuration for a board link
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Transport Configuration
    // -------------------------------------------------------------------------
    /// Device path (`/dev/ttyS0`) or a serial bridge address (`tcp://host:port`)
    pub device: String,

    /// Line rate. Applied by the UART driver; recorded and logged here.
    pub baud_rate: u32,

    /// Bytes requested from the transport per read
    pub read_chunk_size: usize,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Protocol version placed in the low 5 bits of the status byte
    pub protocol_version: u8,

    /// Largest declared payload accepted before the reassembler resyncs
    pub max_payload_len: usize,

    // -------------------------------------------------------------------------
    // Timing Configuration
    // -------------------------------------------------------------------------
    /// Wall-clock bound on every ack/response wait (milliseconds)
    pub response_timeout_ms: u64,

    /// Poll interval for transport reads and inbound waits (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "/dev/ttyS0".to_string(),
            baud_rate: 115_200,
            read_chunk_size: 256,
            protocol_version: 0,
            max_payload_len: 1024,
            response_timeout_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the pump or correlator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(LinkError::Config("device path is empty".to_string()));
        }
        if self.response_timeout_ms == 0 {
            return Err(LinkError::Config("response timeout must be non-zero".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(LinkError::Config("poll interval must be non-zero".to_string()));
        }
        if self.read_chunk_size == 0 {
            return Err(LinkError::Config("read chunk size must be non-zero".to_string()));
        }
        if self.protocol_version > MAX_PROTOCOL_VERSION {
            return Err(LinkError::Config(format!(
                "protocol version {} does not fit in 5 bits",
                self.protocol_version
            )));
        }
        if self.max_payload_len > u16::MAX as usize {
            return Err(LinkError::Config(format!(
                "max payload length {} exceeds the 16-bit length field",
                self.max_payload_len
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the device path or `tcp://` bridge address
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.config.device = device.into();
        self
    }

    /// Set the baud rate
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.config.baud_rate = baud;
        self
    }

    /// Set the transport read chunk size (in bytes)
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set the protocol version (0..=31)
    pub fn protocol_version(mut self, version: u8) -> Self {
        self.config.protocol_version = version;
        self
    }

    /// Set the largest accepted payload length
    pub fn max_payload_len(mut self, len: usize) -> Self {
        self.config.max_payload_len = len;
        self
    }

    /// Set the response timeout (in milliseconds)
    pub fn response_timeout_ms(mut self, ms: u64) -> Self {
        self.config.response_timeout_ms = ms;
        self
    }

    /// Set the poll interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
