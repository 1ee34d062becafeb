//! Command definitions
//!
//! Message identifiers and the static table of payload lengths.

use std::fmt;

use crate::error::{LinkError, Result};

/// Message identifiers understood by the board firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    Ping = 0x00,
    GetSoftwareVersion = 0x01,
    GetSlotNo = 0x07,
    GetHardwareInfo = 0x08,
    GetBitInfo = 0x0A,
    GetUnitInfo = 0x0B,
    SetUnitInfo = 0x0C,
    SetKey = 0xFE,
    GetKey = 0xFF,
}

impl MessageId {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Catalog entry for this id
    pub fn definition(self) -> &'static CommandDefinition {
        let row = match self {
            MessageId::Ping => 0,
            MessageId::GetSoftwareVersion => 1,
            MessageId::GetSlotNo => 2,
            MessageId::GetHardwareInfo => 3,
            MessageId::GetBitInfo => 4,
            MessageId::GetUnitInfo => 5,
            MessageId::SetUnitInfo => 6,
            MessageId::SetKey => 7,
            MessageId::GetKey => 8,
        };
        &CATALOG[row]
    }
}

impl TryFrom<u8> for MessageId {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self> {
        lookup(value).map(|def| def.id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.definition().name)
    }
}

/// Fixed payload lengths for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDefinition {
    pub id: MessageId,
    pub name: &'static str,
    /// Payload length of the NEW frame the host sends
    pub request_payload_len: u16,
    /// Payload length of the RESPONSE frame; `None` when the ack is the whole reply
    pub response_payload_len: Option<u16>,
}

impl CommandDefinition {
    pub fn expects_response(&self) -> bool {
        self.response_payload_len.is_some()
    }
}

/// Every command the board supports
pub static CATALOG: [CommandDefinition; 9] = [
    CommandDefinition {
        id: MessageId::Ping,
        name: "Ping",
        request_payload_len: 0,
        response_payload_len: None,
    },
    CommandDefinition {
        id: MessageId::GetSoftwareVersion,
        name: "GetSoftwareVersion",
        request_payload_len: 0,
        response_payload_len: Some(11),
    },
    CommandDefinition {
        id: MessageId::GetSlotNo,
        name: "GetSlotNo",
        request_payload_len: 0,
        response_payload_len: Some(8),
    },
    CommandDefinition {
        id: MessageId::GetHardwareInfo,
        name: "GetHardwareInfo",
        request_payload_len: 0,
        response_payload_len: Some(73),
    },
    CommandDefinition {
        id: MessageId::GetBitInfo,
        name: "GetBitInfo",
        request_payload_len: 0,
        response_payload_len: Some(10),
    },
    CommandDefinition {
        id: MessageId::GetUnitInfo,
        name: "GetUnitInfo",
        request_payload_len: 0,
        response_payload_len: Some(66),
    },
    CommandDefinition {
        id: MessageId::SetUnitInfo,
        name: "SetUnitInfo",
        request_payload_len: 65,
        response_payload_len: None,
    },
    CommandDefinition {
        id: MessageId::SetKey,
        name: "SetKey",
        request_payload_len: 33,
        response_payload_len: None,
    },
    CommandDefinition {
        id: MessageId::GetKey,
        name: "GetKey",
        request_payload_len: 0,
        response_payload_len: Some(33),
    },
];

/// Find the catalog entry for a raw message id
pub fn lookup(message_id: u8) -> Result<&'static CommandDefinition> {
    CATALOG
        .iter()
        .find(|def| def.id.as_u8() == message_id)
        .ok_or(LinkError::InvalidCommand(message_id))
}
