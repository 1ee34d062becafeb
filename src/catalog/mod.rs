//! Command Catalog Module
//!
//! Central table of the commands the board firmware understands.
//!
//! ## Commands
//! | Id   | Command            | Request | Response |
//! |------|--------------------|---------|----------|
//! | 0x00 | Ping               | 0       | ack only |
//! | 0x01 | GetSoftwareVersion | 0       | 11       |
//! | 0x07 | GetSlotNo          | 0       | 8        |
//! | 0x08 | GetHardwareInfo    | 0       | 73       |
//! | 0x0A | GetBitInfo         | 0       | 10       |
//! | 0x0B | GetUnitInfo        | 0       | 66       |
//! | 0x0C | SetUnitInfo        | 65      | ack only |
//! | 0xFE | SetKey             | 33      | ack only |
//! | 0xFF | GetKey             | 0       | 33       |

mod command;
mod payload;

pub use command::{lookup, CommandDefinition, MessageId, CATALOG};
pub use payload::{
    pack_set_key, pack_set_unit_info, unpack_bit_info, unpack_hardware_info, unpack_key,
    unpack_slot_no, unpack_software_version, unpack_unit_info, KeyResponse, KeyToken,
    SoftwareVersion, VersionedPayload, KEY_LEN, PAYLOAD_VERSION, UNIT_INFO_LEN,
};
