//! Typed payloads
//!
//! Pack helpers for request payloads and unpack helpers for response frames.
//! Every unpack checks the message id and that the frame is exactly the
//! length the catalog fixes for that command before reading any field.

use std::fmt;

use bytes::{Buf, Bytes};
use serde::{Serialize, Serializer};

use crate::error::{LinkError, Result};
use crate::protocol::{frame_len, Frame};
use super::command::MessageId;

/// Length of the opaque disk-encryption key token
pub const KEY_LEN: usize = 32;

/// Payload version byte the host writes in front of SetKey / SetUnitInfo bodies
pub const PAYLOAD_VERSION: u8 = 0x01;

/// Length of the SetUnitInfo body that follows the payload version byte
pub const UNIT_INFO_LEN: usize = 64;

// =============================================================================
// Key Token
// =============================================================================

/// A 32-byte key token, supplied by the external key manager
///
/// Tokens the host builds for SetKey must be ASCII. Tokens read back from the
/// board are opaque and carried exactly as received.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyToken([u8; KEY_LEN]);

impl KeyToken {
    /// Accept exactly 32 bytes of ASCII
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            LinkError::InvalidPayload(format!(
                "key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        if !key.is_ascii() {
            return Err(LinkError::InvalidPayload("key must be ASCII".to_string()));
        }
        Ok(Self(key))
    }

    /// Wrap key bytes as the board reported them, unchecked
    pub fn from_raw(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// The key as text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl std::str::FromStr for KeyToken {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl fmt::Debug for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyToken(<redacted>)")
    }
}

impl Serialize for KeyToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// GetSoftwareVersion response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SoftwareVersion {
    pub payload_version: u8,
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u32,
}

impl fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}.{}.{}:{}", self.major, self.minor, self.patch, self.build)
    }
}

/// GetKey response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyResponse {
    pub payload_version: u8,
    pub key: KeyToken,
}

/// A response whose body is carried as raw bytes after the version byte
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedPayload {
    pub payload_version: u8,
    #[serde(serialize_with = "serialize_hex")]
    pub body: Bytes,
}

fn serialize_hex<S: Serializer>(body: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&crate::protocol::hex_dump(body))
}

// =============================================================================
// Pack Helpers
// =============================================================================

/// SetKey payload: version byte + key
pub fn pack_set_key(key: &KeyToken) -> [u8; 1 + KEY_LEN] {
    let mut payload = [0u8; 1 + KEY_LEN];
    payload[0] = PAYLOAD_VERSION;
    payload[1..].copy_from_slice(key.as_bytes());
    payload
}

/// SetUnitInfo payload: version byte + unit info body
pub fn pack_set_unit_info(unit_info: &[u8; UNIT_INFO_LEN]) -> [u8; 1 + UNIT_INFO_LEN] {
    let mut payload = [0u8; 1 + UNIT_INFO_LEN];
    payload[0] = PAYLOAD_VERSION;
    payload[1..].copy_from_slice(unit_info);
    payload
}

// =============================================================================
// Unpack Helpers
// =============================================================================

/// Check id and exact frame length, then hand back the payload
fn checked_payload(frame: &Frame, id: MessageId) -> Result<Bytes> {
    if frame.message_id() != id.as_u8() {
        return Err(LinkError::InvalidPayload(format!(
            "{} unpack given message 0x{:02x}",
            id,
            frame.message_id()
        )));
    }

    let expected = frame_len(id.definition().response_payload_len.unwrap_or(0) as usize);
    if frame.encoded_len() != expected {
        tracing::error!(
            "Unpack {} response expecting {}-byte frame, got {}",
            id,
            expected,
            frame.encoded_len()
        );
        return Err(LinkError::InvalidPayload(format!(
            "{} response expects {}-byte frame, got {}",
            id,
            expected,
            frame.encoded_len()
        )));
    }

    Ok(frame.payload.clone())
}

pub fn unpack_software_version(frame: &Frame) -> Result<SoftwareVersion> {
    let mut buf = checked_payload(frame, MessageId::GetSoftwareVersion)?;
    Ok(SoftwareVersion {
        payload_version: buf.get_u8(),
        major: buf.get_u16_le(),
        minor: buf.get_u16_le(),
        patch: buf.get_u16_le(),
        build: buf.get_u32_le(),
    })
}

pub fn unpack_key(frame: &Frame) -> Result<KeyResponse> {
    let mut buf = checked_payload(frame, MessageId::GetKey)?;
    let payload_version = buf.get_u8();
    let mut key = [0u8; KEY_LEN];
    buf.copy_to_slice(&mut key);
    Ok(KeyResponse {
        payload_version,
        key: KeyToken::from_raw(key),
    })
}

fn unpack_versioned(frame: &Frame, id: MessageId) -> Result<VersionedPayload> {
    let mut buf = checked_payload(frame, id)?;
    let payload_version = buf.get_u8();
    Ok(VersionedPayload {
        payload_version,
        body: buf,
    })
}

pub fn unpack_slot_no(frame: &Frame) -> Result<VersionedPayload> {
    unpack_versioned(frame, MessageId::GetSlotNo)
}

pub fn unpack_hardware_info(frame: &Frame) -> Result<VersionedPayload> {
    unpack_versioned(frame, MessageId::GetHardwareInfo)
}

pub fn unpack_bit_info(frame: &Frame) -> Result<VersionedPayload> {
    unpack_versioned(frame, MessageId::GetBitInfo)
}

pub fn unpack_unit_info(frame: &Frame) -> Result<VersionedPayload> {
    unpack_versioned(frame, MessageId::GetUnitInfo)
}
