//! Pump Module
//!
//! Background I/O between the transport and the in/out queues.
//!
//! ## Architecture
//! - One worker thread owns the transport
//! - Each loop: write every queued outbound buffer, then one bounded read
//! - Read bytes feed a `FrameAssembler`; every complete frame, valid or not,
//!   goes to the inbound queue

mod assembler;
mod message_pump;

pub use assembler::{FrameAssembler, InboundFrame};
pub use message_pump::MessagePump;
