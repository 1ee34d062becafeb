//! Board Link
//!
//! Caller-facing handle that coordinates the pump and the correlator.
//!
//! ## Responsibilities
//! - Start/stop the message pump
//! - Route commands through the correlator with the configured timeout
//! - Pack request payloads and unpack typed responses

use std::sync::Arc;

use crate::catalog::{self, KeyToken, MessageId, SoftwareVersion, VersionedPayload, UNIT_INFO_LEN};
use crate::config::Config;
use crate::correlator::Correlator;
use crate::error::{LinkError, Result};
use crate::protocol::Frame;
use crate::pump::MessagePump;
use crate::transport::Transport;

/// A connection to one control board
///
/// ## Concurrency Model: one request at a time
///
/// All methods take `&self`, so a `BoardLink` can be shared (e.g. in an
/// `Arc`) with a thread that calls `stop()`. Requests themselves must be
/// issued one after another; overlapping requests fail with
/// `RequestInFlight`.
pub struct BoardLink {
    config: Config,
    pump: Arc<MessagePump>,
    correlator: Correlator,
}

impl BoardLink {
    /// Open the configured device and start the pump
    pub fn open(config: Config) -> Result<Self> {
        let pump = Arc::new(MessagePump::start(&config)?);
        Ok(Self::from_pump(pump, config))
    }

    /// Start the pump over a transport the caller already opened
    pub fn with_transport(transport: Box<dyn Transport>, config: Config) -> Result<Self> {
        let pump = Arc::new(MessagePump::with_transport(transport, &config)?);
        Ok(Self::from_pump(pump, config))
    }

    fn from_pump(pump: Arc<MessagePump>, config: Config) -> Self {
        let correlator = Correlator::new(Arc::clone(&pump), &config);
        Self {
            config,
            pump,
            correlator,
        }
    }

    /// Stop the pump; any wait in progress returns `Disconnected`
    pub fn stop(&self) {
        self.pump.stop();
    }

    pub fn is_connected(&self) -> bool {
        self.pump.is_running()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Ping the board; `Ok` once it acks
    pub fn send_ping(&self) -> Result<()> {
        self.correlator.send_and_wait_for_ack(
            MessageId::Ping.as_u8(),
            &[],
            self.config.response_timeout(),
        )
    }

    /// Issue a query command and return its response frame
    pub fn get_command(&self, id: MessageId, expected_len: u16) -> Result<Frame> {
        self.correlator.send_command_and_wait_for_response(
            id.as_u8(),
            expected_len,
            self.config.response_timeout(),
        )
    }

    /// Issue a query command using the catalog's response length
    fn query(&self, id: MessageId) -> Result<Frame> {
        let len = id
            .definition()
            .response_payload_len
            .ok_or(LinkError::InvalidCommand(id.as_u8()))?;
        self.get_command(id, len)
    }

    /// Hand the board the disk-encryption key
    pub fn send_set_key(&self, key: &KeyToken) -> Result<()> {
        self.correlator.send_and_wait_for_ack(
            MessageId::SetKey.as_u8(),
            &catalog::pack_set_key(key),
            self.config.response_timeout(),
        )
    }

    /// Read back the key the board holds
    pub fn get_key(&self) -> Result<KeyToken> {
        let frame = self.query(MessageId::GetKey)?;
        Ok(catalog::unpack_key(&frame)?.key)
    }

    pub fn get_software_version(&self) -> Result<SoftwareVersion> {
        let frame = self.query(MessageId::GetSoftwareVersion)?;
        catalog::unpack_software_version(&frame)
    }

    pub fn get_slot_no(&self) -> Result<VersionedPayload> {
        catalog::unpack_slot_no(&self.query(MessageId::GetSlotNo)?)
    }

    pub fn get_hardware_info(&self) -> Result<VersionedPayload> {
        catalog::unpack_hardware_info(&self.query(MessageId::GetHardwareInfo)?)
    }

    pub fn get_bit_info(&self) -> Result<VersionedPayload> {
        catalog::unpack_bit_info(&self.query(MessageId::GetBitInfo)?)
    }

    pub fn get_unit_info(&self) -> Result<VersionedPayload> {
        catalog::unpack_unit_info(&self.query(MessageId::GetUnitInfo)?)
    }

    pub fn set_unit_info(&self, unit_info: &[u8; UNIT_INFO_LEN]) -> Result<()> {
        self.correlator.send_and_wait_for_ack(
            MessageId::SetUnitInfo.as_u8(),
            &catalog::pack_set_unit_info(unit_info),
            self.config.response_timeout(),
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for BoardLink {
    fn drop(&mut self) {
        self.pump.stop();
    }
}
