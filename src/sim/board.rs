//! Simulated Board
//!
//! Firmware-side half of the protocol: acks every request it understands and
//! answers queries from its in-memory state.

use crate::catalog::{MessageId, SoftwareVersion, KEY_LEN, PAYLOAD_VERSION, UNIT_INFO_LEN};
use crate::protocol::{self, Frame, MessageClass, StatusByte, CRC_SIZE};
use crate::pump::FrameAssembler;

/// Registers the simulated firmware answers from
#[derive(Debug, Clone)]
pub struct BoardState {
    pub software_version: SoftwareVersion,
    pub slot_no: u8,
    pub key: [u8; KEY_LEN],
    pub unit_info: [u8; UNIT_INFO_LEN],
    pub hardware_info: [u8; 72],
    pub bit_info: [u8; 9],
}

impl Default for BoardState {
    fn default() -> Self {
        let mut hardware_info = [b' '; 72];
        let ident = b"BLK-BACKPLANE REV C SN 000123";
        hardware_info[..ident.len()].copy_from_slice(ident);

        Self {
            software_version: SoftwareVersion {
                payload_version: PAYLOAD_VERSION,
                major: 1,
                minor: 4,
                patch: 2,
                build: 1187,
            },
            slot_no: 3,
            key: [0u8; KEY_LEN],
            unit_info: [0u8; UNIT_INFO_LEN],
            hardware_info,
            bit_info: [0u8; 9],
        }
    }
}

/// Misbehaviours the board can be told to exhibit
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Powered but unresponsive: receive, never reply
    pub mute: bool,
    /// Ack, but never send the response frame
    pub drop_responses: bool,
    /// Send the response one payload byte short
    pub truncate_responses: bool,
    /// Flip a bit in the CRC of every reply
    pub corrupt_crc: bool,
    /// Ack with the wrong acknowledgement number
    pub wrong_ack_no: bool,
    /// Send responses with the NEW class, as older firmware does
    pub legacy_response_class: bool,
}

/// In-process stand-in for the board firmware
#[derive(Debug)]
pub struct SimulatedBoard {
    pub state: BoardState,
    pub faults: Faults,
    protocol_version: u8,
    sequence: u8,
    assembler: FrameAssembler,
    requests_received: u64,
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new(BoardState::default())
    }
}

impl SimulatedBoard {
    pub fn new(state: BoardState) -> Self {
        Self {
            state,
            faults: Faults::default(),
            protocol_version: 0,
            sequence: 0,
            assembler: FrameAssembler::new(1024),
            requests_received: 0,
        }
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Valid request frames seen so far
    pub fn requests_received(&self) -> u64 {
        self.requests_received
    }

    /// Feed bytes from the host; returns the bytes the board sends back
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.assembler.push(bytes);

        let mut out = Vec::new();
        while let Some(inbound) = self.assembler.next_frame() {
            match inbound.frame {
                Ok(request) => {
                    for reply in self.handle(&request) {
                        out.extend_from_slice(&reply);
                    }
                }
                Err(e) => tracing::warn!("Board dropped invalid request: {}", e),
            }
        }
        out
    }

    /// Replies (already encoded) to one request frame
    pub fn handle(&mut self, request: &Frame) -> Vec<Vec<u8>> {
        self.requests_received += 1;

        if request.class() != Some(MessageClass::New) {
            tracing::debug!("Board ignoring non-NEW frame id=0x{:02x}", request.message_id());
            return Vec::new();
        }
        let Ok(id) = MessageId::try_from(request.message_id()) else {
            tracing::debug!("Board ignoring unknown id 0x{:02x}", request.message_id());
            return Vec::new();
        };
        if request.payload.len() != id.definition().request_payload_len as usize {
            tracing::debug!("Board ignoring {} with {} byte payload", id, request.payload.len());
            return Vec::new();
        }
        if self.faults.mute {
            return Vec::new();
        }

        let response = self.apply(id, &request.payload);

        let mut replies = Vec::with_capacity(2);
        let ack_no = if self.faults.wrong_ack_no {
            request.sequence_no().wrapping_add(1)
        } else {
            request.sequence_no()
        };
        replies.extend(self.reply(MessageClass::Ack, ack_no, id, &[]));

        if let Some(mut payload) = response {
            if self.faults.truncate_responses {
                payload.pop();
            }
            let class = if self.faults.legacy_response_class {
                MessageClass::New
            } else {
                MessageClass::Response
            };
            if !self.faults.drop_responses {
                replies.extend(self.reply(class, request.sequence_no(), id, &payload));
            }
        }
        replies
    }

    /// Update state for setters; build the response payload for queries
    fn apply(&mut self, id: MessageId, payload: &[u8]) -> Option<Vec<u8>> {
        let mut body = vec![PAYLOAD_VERSION];
        match id {
            MessageId::Ping => return None,
            MessageId::SetKey => {
                self.state.key.copy_from_slice(&payload[1..]);
                return None;
            }
            MessageId::SetUnitInfo => {
                self.state.unit_info.copy_from_slice(&payload[1..]);
                return None;
            }
            MessageId::GetSoftwareVersion => {
                let v = &self.state.software_version;
                body[0] = v.payload_version;
                body.extend_from_slice(&v.major.to_le_bytes());
                body.extend_from_slice(&v.minor.to_le_bytes());
                body.extend_from_slice(&v.patch.to_le_bytes());
                body.extend_from_slice(&v.build.to_le_bytes());
            }
            MessageId::GetSlotNo => {
                body.push(self.state.slot_no);
                body.extend_from_slice(&[0u8; 6]);
            }
            MessageId::GetHardwareInfo => body.extend_from_slice(&self.state.hardware_info),
            MessageId::GetBitInfo => body.extend_from_slice(&self.state.bit_info),
            MessageId::GetUnitInfo => {
                body.push(self.state.slot_no);
                body.extend_from_slice(&self.state.unit_info);
            }
            MessageId::GetKey => body.extend_from_slice(&self.state.key),
        }
        Some(body)
    }

    fn reply(&mut self, class: MessageClass, ack_no: u8, id: MessageId, payload: &[u8]) -> Option<Vec<u8>> {
        self.sequence = self.sequence.wrapping_add(1);
        let status = StatusByte::new(class, self.protocol_version);

        let mut bytes = match protocol::build_frame(self.sequence, ack_no, status, id.as_u8(), payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Board could not encode reply: {}", e);
                return None;
            }
        };
        if self.faults.corrupt_crc {
            let at = bytes.len() - CRC_SIZE;
            bytes[at] ^= 0x01;
        }
        Some(bytes)
    }
}
