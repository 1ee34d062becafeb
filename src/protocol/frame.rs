//! Frame definitions
//!
//! Header fields, the status byte, and a parsed frame.

use bytes::Bytes;

/// Header size: seq (1) + ack (1) + status (1) + msg id (1) + payload len (2)
pub const HEADER_SIZE: usize = 6;

/// Trailing CRC16 size
pub const CRC_SIZE: usize = 2;

/// Smallest possible frame: header + CRC, no payload
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CRC_SIZE;

/// Header field offsets
pub mod offset {
    pub const SEQUENCE_NO: usize = 0;
    pub const ACK_NO: usize = 1;
    pub const STATUS: usize = 2;
    pub const MESSAGE_ID: usize = 3;
    pub const PAYLOAD_LEN: usize = 4;
}

const CLASS_MASK: u8 = 0xE0;
const VERSION_MASK: u8 = 0x1F;

/// Message class carried in the top 3 bits of the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageClass {
    New = 0x00,
    Ack = 0x40,
    Response = 0x80,
}

impl MessageClass {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits & CLASS_MASK {
            0x00 => Some(MessageClass::New),
            0x40 => Some(MessageClass::Ack),
            0x80 => Some(MessageClass::Response),
            _ => None,
        }
    }
}

/// The status / protocol-version byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte(u8);

impl StatusByte {
    /// Combine a class with a protocol version (low 5 bits kept)
    pub fn new(class: MessageClass, protocol_version: u8) -> Self {
        Self(class as u8 | (protocol_version & VERSION_MASK))
    }

    pub fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    /// `None` for the class bit patterns the protocol leaves unassigned
    pub fn class(self) -> Option<MessageClass> {
        MessageClass::from_bits(self.0)
    }

    pub fn protocol_version(self) -> u8 {
        self.0 & VERSION_MASK
    }

    pub fn is_ack(self) -> bool {
        self.class() == Some(MessageClass::Ack)
    }
}

/// Fixed-width frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sequence_no: u8,
    pub ack_no: u8,
    pub status: StatusByte,
    pub message_id: u8,
    pub payload_len: u16,
}

/// A complete, CRC-validated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Bytes,
}

impl Frame {
    pub fn sequence_no(&self) -> u8 {
        self.header.sequence_no
    }

    pub fn ack_no(&self) -> u8 {
        self.header.ack_no
    }

    pub fn message_id(&self) -> u8 {
        self.header.message_id
    }

    pub fn class(&self) -> Option<MessageClass> {
        self.header.status.class()
    }

    /// Total bytes this frame occupies on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CRC_SIZE
    }
}
