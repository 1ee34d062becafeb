//! Frame Assembler
//!
//! Reassembles frames from an unframed byte stream.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::{self, Frame, HEADER_SIZE};

/// A frame as it came off the wire, valid or not
///
/// Invalid frames are kept so the correlator can log the mismatch instead of
/// silently losing a response.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// The exact bytes sliced from the stream
    pub raw: Bytes,

    /// Codec verdict on `raw`
    pub frame: Result<Frame, FrameError>,
}

impl InboundFrame {
    pub fn is_valid(&self) -> bool {
        self.frame.is_ok()
    }
}

/// Accumulates bytes and slices off complete frames
///
/// A frame is complete once the buffer holds header + declared payload + CRC.
/// A declared payload length above `max_payload_len` can only come from a
/// lost frame boundary; one byte is dropped and the scan resumes.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    max_payload_len: usize,
    resync_bytes: u64,
}

impl FrameAssembler {
    pub fn new(max_payload_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(HEADER_SIZE + max_payload_len.min(4096)),
            max_payload_len,
            resync_bytes: 0,
        }
    }

    /// Append freshly read bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Slice off the next complete frame, if the buffer holds one
    pub fn next_frame(&mut self) -> Option<InboundFrame> {
        loop {
            let header = protocol::peek_header(&self.buffer)?;
            let payload_len = header.payload_len as usize;

            if payload_len > self.max_payload_len {
                tracing::warn!(
                    "Declared payload length {} exceeds {}, dropping byte 0x{:02x} to resync",
                    payload_len,
                    self.max_payload_len,
                    self.buffer[0]
                );
                self.buffer.advance(1);
                self.resync_bytes += 1;
                continue;
            }

            let total = protocol::frame_len(payload_len);
            if self.buffer.len() < total {
                return None;
            }

            let raw = self.buffer.split_to(total).freeze();
            let frame = protocol::parse(&raw);
            if let Err(ref e) = frame {
                tracing::warn!("Invalid frame ({}): {}", e, protocol::hex_dump(&raw));
            }
            return Some(InboundFrame { raw, frame });
        }
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes dropped while hunting for a frame boundary
    pub fn resync_bytes(&self) -> u64 {
        self.resync_bytes
    }

    /// Drop any partial frame, returning how many bytes were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.buffer.len();
        self.buffer.clear();
        discarded
    }
}
