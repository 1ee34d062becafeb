//! Protocol Module
//!
//! Defines the framed wire protocol spoken with the control board.
//!
//! ## Frame Format
//! ```text
//! ┌────────┬────────┬──────────┬────────┬─────────┬───────────┬─────────┐
//! │ Seq(1) │ Ack(1) │Status(1) │ Id (1) │ Len (2) │  Payload  │ CRC (2) │
//! └────────┴────────┴──────────┴────────┴─────────┴───────────┴─────────┘
//! ```
//!
//! ### Status Byte
//! - bits 7..5: message class (0x00 NEW, 0x40 ACK, 0x80 RESPONSE)
//! - bits 4..0: protocol version
//!
//! ### Exchange
//! - host sends NEW with a fresh sequence number
//! - board replies ACK with `ack_no` = that sequence number
//! - commands with a response payload get a further RESPONSE frame

mod crc;
mod frame;
mod codec;

pub use crc::{compute_crc, CRC_SEED};
pub use frame::{offset, Frame, Header, MessageClass, StatusByte, CRC_SIZE, HEADER_SIZE, MIN_FRAME_SIZE};
pub use codec::{build_frame, build_header, encode_frame, frame_len, hex_dump, parse, peek_header};
