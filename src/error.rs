//! Error types for boardlink
//!
//! Provides a unified error type for all link operations, plus the
//! frame-level error returned by the codec.

use thiserror::Error;

/// Result type alias using LinkError
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors raised while validating a single frame
///
/// These are recoverable: the frame is excluded from correlation and the
/// session carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: need at least {minimum} bytes, got {actual}")]
    TooShort { minimum: usize, actual: usize },

    #[error("frame length mismatch: header declares {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("payload of {len} bytes does not fit the 16-bit length field")]
    PayloadTooLarge { len: usize },

    #[error("frame CRC mismatch: computed 0x{computed:04x}, frame carries 0x{received:04x}")]
    CrcMismatch { computed: u16, received: u16 },
}

/// Unified error type for boardlink operations
#[derive(Debug, Error)]
pub enum LinkError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    // -------------------------------------------------------------------------
    // Pump Errors
    // -------------------------------------------------------------------------
    #[error("Failed to start message pump: {0}")]
    Start(String),

    #[error("Link disconnected")]
    Disconnected,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Timed out after {waited_ms} ms waiting for message 0x{msg_id:02x}")]
    TimedOut { msg_id: u8, waited_ms: u64 },

    #[error("Request 0x{sequence_no:02x} still in flight")]
    RequestInFlight { sequence_no: u8 },

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("Invalid command: 0x{0:02x}")]
    InvalidCommand(u8),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LinkError {
    /// True for outcomes a test script should count as a failed attempt and
    /// move past, rather than a broken session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LinkError::TimedOut { .. } | LinkError::Frame(_) | LinkError::InvalidPayload(_)
        )
    }
}
