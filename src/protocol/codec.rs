//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//! ```text
//! ┌────────┬────────┬──────────┬────────┬─────────┬───────────┬─────────┐
//! │ Seq(1) │ Ack(1) │Status(1) │ Id (1) │ Len (2) │  Payload  │ CRC (2) │
//! └────────┴────────┴──────────┴────────┴─────────┴───────────┴─────────┘
//! ```
//! All multi-byte fields are little-endian. The CRC covers header + payload.

use bytes::Bytes;

use crate::error::FrameError;
use super::crc::compute_crc;
use super::frame::{offset, Frame, Header, StatusByte, CRC_SIZE, HEADER_SIZE, MIN_FRAME_SIZE};

// =============================================================================
// Encoding
// =============================================================================

/// Encode a header
pub fn build_header(
    sequence_no: u8,
    ack_no: u8,
    status: StatusByte,
    message_id: u8,
    payload_len: u16,
) -> [u8; HEADER_SIZE] {
    let len = payload_len.to_le_bytes();
    [sequence_no, ack_no, status.raw(), message_id, len[0], len[1]]
}

/// Encode a complete frame: header + payload + CRC
pub fn build_frame(
    sequence_no: u8,
    ack_no: u8,
    status: StatusByte,
    message_id: u8,
    payload: &[u8],
) -> Result<Vec<u8>, FrameError> {
    let payload_len = u16::try_from(payload.len())
        .map_err(|_| FrameError::PayloadTooLarge { len: payload.len() })?;

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    message.extend_from_slice(&build_header(sequence_no, ack_no, status, message_id, payload_len));
    message.extend_from_slice(payload);

    let crc = compute_crc(&message);
    message.extend_from_slice(&crc.to_le_bytes());

    Ok(message)
}

/// Re-encode a parsed frame
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameError> {
    let h = &frame.header;
    build_frame(h.sequence_no, h.ack_no, h.status, h.message_id, &frame.payload)
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode just the header from the front of `bytes`
///
/// Returns `None` until a full header is available.
pub fn peek_header(bytes: &[u8]) -> Option<Header> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }
    Some(Header {
        sequence_no: bytes[offset::SEQUENCE_NO],
        ack_no: bytes[offset::ACK_NO],
        status: StatusByte::from_raw(bytes[offset::STATUS]),
        message_id: bytes[offset::MESSAGE_ID],
        payload_len: u16::from_le_bytes([bytes[offset::PAYLOAD_LEN], bytes[offset::PAYLOAD_LEN + 1]]),
    })
}

/// Total frame size implied by a declared payload length
pub fn frame_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len + CRC_SIZE
}

/// Parse and validate exactly one frame
///
/// `buffer` must hold one whole frame and nothing else.
pub fn parse(buffer: &[u8]) -> Result<Frame, FrameError> {
    if buffer.len() < MIN_FRAME_SIZE {
        return Err(FrameError::TooShort {
            minimum: MIN_FRAME_SIZE,
            actual: buffer.len(),
        });
    }

    let header = peek_header(buffer).ok_or(FrameError::TooShort {
        minimum: HEADER_SIZE,
        actual: buffer.len(),
    })?;

    let expected = frame_len(header.payload_len as usize);
    if buffer.len() != expected {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: buffer.len(),
        });
    }

    let crc_at = expected - CRC_SIZE;
    let received = u16::from_le_bytes([buffer[crc_at], buffer[crc_at + 1]]);
    let computed = compute_crc(&buffer[..crc_at]);
    if computed != received {
        return Err(FrameError::CrcMismatch { computed, received });
    }

    Ok(Frame {
        header,
        payload: Bytes::copy_from_slice(&buffer[HEADER_SIZE..crc_at]),
    })
}

/// Space-separated hex dump for debug logging
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
