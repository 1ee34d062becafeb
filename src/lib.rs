//! # boardlink
//!
//! Framed serial command/response engine for an embedded control board:
//! - CRC-CCITT protected frames with sequence/ack numbers
//! - Background pump reassembling frames from the UART byte stream
//! - Correlation of acks and responses to the one outstanding request
//! - Wall-clock timeouts on every wait
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        BoardLink                             │
//! │        (send_ping / get_command / send_set_key ...)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Correlator                              │
//! │        (sequence numbers, ack/response matching)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │ outbound         inbound│
//!          ▼                         │
//!   ┌─────────────────────────────────────┐
//!   │            MessagePump              │
//!   │  (worker thread + FrameAssembler)   │
//!   └──────────────────┬──────────────────┘
//!                      │
//!                      ▼
//!              ┌───────────────┐
//!              │   Transport   │
//!              │ (UART / TCP)  │
//!              └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod catalog;
pub mod transport;
pub mod pump;
pub mod correlator;
pub mod link;
pub mod sim;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FrameError, LinkError, Result};
pub use config::Config;
pub use link::BoardLink;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of boardlink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
