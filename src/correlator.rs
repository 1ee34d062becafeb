//! Request/Response Correlator
//!
//! Issues sequence numbers, sends a request through the pump, and matches
//! the board's ack (and response) against it.
//!
//! ## Exchange
//! ```text
//!   host                                   board
//!    │ NEW      seq=n, ack=0, id              │
//!    │ ─────────────────────────────────────► │
//!    │ ACK      ack=n, id                     │
//!    │ ◄───────────────────────────────────── │
//!    │ RESPONSE ack=n, id, payload            │  (commands with a response)
//!    │ ◄───────────────────────────────────── │
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::catalog::{self, CommandDefinition};
use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::protocol::{self, Frame, MessageClass, StatusByte};
use crate::pump::MessagePump;

/// The single request currently awaiting its ack/response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub sequence_no: u8,
    pub message_id: u8,
    pub issued_at: Instant,
    pub expected_response_payload_len: Option<u16>,
}

/// Clears the pending slot however the exchange ends
struct PendingGuard<'a> {
    slot: &'a Mutex<Option<PendingRequest>>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// Matches inbound frames to the one outstanding request
///
/// Holds the pump handle and identifiers only; the transport stays with the
/// pump thread.
pub struct Correlator {
    pump: Arc<MessagePump>,
    sequence: AtomicU8,
    pending: Mutex<Option<PendingRequest>>,
    protocol_version: u8,
    poll_interval: Duration,
}

impl Correlator {
    pub fn new(pump: Arc<MessagePump>, config: &Config) -> Self {
        Self {
            pump,
            sequence: AtomicU8::new(0),
            pending: Mutex::new(None),
            protocol_version: config.protocol_version,
            poll_interval: config.poll_interval(),
        }
    }

    /// Next sequence number: 1, 2, ... 255, 1, ...
    ///
    /// 0 is reserved for "new message, no prior ack" and never issued.
    pub fn next_sequence_number(&self) -> u8 {
        let previous = self
            .sequence
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |seq| Some(advance(seq)))
            .unwrap_or_default();
        advance(previous)
    }

    /// The request in flight, if any
    pub fn pending(&self) -> Option<PendingRequest> {
        *self.pending.lock()
    }

    /// Send `payload` under `msg_id` and wait for the board's ack
    pub fn send_and_wait_for_ack(&self, msg_id: u8, payload: &[u8], timeout: Duration) -> Result<()> {
        let def = catalog::lookup(msg_id)?;
        check_request_payload(def, payload)?;

        let (pending, _guard) = self.issue(def, payload, None)?;
        let deadline = pending.issued_at + timeout;
        self.wait_for_ack(def, &pending, deadline)?;
        Ok(())
    }

    /// Send an empty request under `msg_id` and wait for ack then response
    ///
    /// `response_payload_len` must match the catalog entry. The ack and the
    /// response share one deadline, measured from when the request went out.
    pub fn send_command_and_wait_for_response(
        &self,
        msg_id: u8,
        response_payload_len: u16,
        timeout: Duration,
    ) -> Result<Frame> {
        let def = catalog::lookup(msg_id)?;
        if def.response_payload_len != Some(response_payload_len) {
            tracing::error!(
                "{} expects a {:?} byte response, caller asked for {}",
                def.name,
                def.response_payload_len,
                response_payload_len
            );
            return Err(LinkError::InvalidCommand(msg_id));
        }
        self.send_with_payload_and_wait_for_response(msg_id, &[], timeout)
    }

    /// Send `payload` under `msg_id` and wait for ack then response
    pub fn send_with_payload_and_wait_for_response(
        &self,
        msg_id: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Frame> {
        let def = catalog::lookup(msg_id)?;
        check_request_payload(def, payload)?;
        let response_len = def
            .response_payload_len
            .ok_or(LinkError::InvalidCommand(msg_id))?;

        let (pending, _guard) = self.issue(def, payload, Some(response_len))?;
        let sequence_no = pending.sequence_no;
        let deadline = pending.issued_at + timeout;

        if let Err(e) = self.wait_for_ack(def, &pending, deadline) {
            tracing::debug!("No ack for {}", def.name);
            return Err(e);
        }

        self.wait_for(&pending, deadline, |frame| {
            if frame.payload.len() != response_len as usize {
                tracing::debug!(
                    "{} response failed length check: {} bytes, expected {}",
                    def.name,
                    frame.encoded_len(),
                    protocol::frame_len(response_len as usize)
                );
                return false;
            }
            let class_ok = matches!(frame.class(), Some(MessageClass::Response | MessageClass::New));
            let matched = class_ok && frame.ack_no() == sequence_no && frame.message_id() == def.id.as_u8();
            if !matched {
                log_mismatch("response", frame, sequence_no, def);
            }
            matched
        })
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Claim the pending slot, then build and queue the NEW frame
    fn issue(
        &self,
        def: &CommandDefinition,
        payload: &[u8],
        expected_response_payload_len: Option<u16>,
    ) -> Result<(PendingRequest, PendingGuard<'_>)> {
        let pending = {
            let mut slot = self.pending.lock();
            if let Some(pending) = *slot {
                return Err(LinkError::RequestInFlight {
                    sequence_no: pending.sequence_no,
                });
            }

            let pending = PendingRequest {
                sequence_no: self.next_sequence_number(),
                message_id: def.id.as_u8(),
                issued_at: Instant::now(),
                expected_response_payload_len,
            };
            *slot = Some(pending);
            pending
        };
        let sequence_no = pending.sequence_no;
        let guard = PendingGuard { slot: &self.pending };

        self.drain_stale();

        let status = StatusByte::new(MessageClass::New, self.protocol_version);
        let bytes = protocol::build_frame(sequence_no, 0, status, def.id.as_u8(), payload)?;
        tracing::debug!("Tx {} seq={}: {}", def.name, sequence_no, protocol::hex_dump(&bytes));
        self.pump.enqueue_outbound(bytes)?;

        Ok((pending, guard))
    }

    /// Frames left over from an earlier, abandoned exchange
    fn drain_stale(&self) {
        while let Some(stale) = self.pump.try_dequeue_inbound() {
            tracing::debug!("Dropping stale frame: {}", protocol::hex_dump(&stale.raw));
        }
    }

    fn wait_for_ack(
        &self,
        def: &CommandDefinition,
        pending: &PendingRequest,
        deadline: Instant,
    ) -> Result<Frame> {
        let sequence_no = pending.sequence_no;
        self.wait_for(pending, deadline, |frame| {
            let matched = frame.header.status.is_ack()
                && frame.ack_no() == sequence_no
                && frame.message_id() == def.id.as_u8();
            if !matched {
                log_mismatch("ack", frame, sequence_no, def);
            }
            matched
        })
    }

    /// Take inbound frames until `accept` says yes or the deadline passes
    ///
    /// Invalid and rejected frames are logged and dropped.
    fn wait_for<F>(&self, pending: &PendingRequest, deadline: Instant, mut accept: F) -> Result<Frame>
    where
        F: FnMut(&Frame) -> bool,
    {
        let msg_id = pending.message_id;
        loop {
            let now = Instant::now();
            if now >= deadline {
                let waited_ms = now.duration_since(pending.issued_at).as_millis() as u64;
                tracing::debug!("Timed out after {} ms waiting for message 0x{:02x}", waited_ms, msg_id);
                return Err(LinkError::TimedOut { msg_id, waited_ms });
            }

            let wait = (deadline - now).min(self.poll_interval);
            let Some(inbound) = self.pump.dequeue_inbound_timeout(wait)? else {
                continue;
            };

            match inbound.frame {
                Ok(frame) if accept(&frame) => return Ok(frame),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    "Ignoring invalid frame while waiting for 0x{:02x}: {}",
                    msg_id,
                    e
                ),
            }
        }
    }
}

/// 255 wraps to 1, skipping the reserved 0
fn advance(seq: u8) -> u8 {
    match seq.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}

fn check_request_payload(def: &CommandDefinition, payload: &[u8]) -> Result<()> {
    if payload.len() != def.request_payload_len as usize {
        return Err(LinkError::InvalidPayload(format!(
            "{} request payload must be {} bytes, got {}",
            def.name,
            def.request_payload_len,
            payload.len()
        )));
    }
    Ok(())
}

fn log_mismatch(waiting_for: &str, frame: &Frame, sequence_no: u8, def: &CommandDefinition) {
    tracing::debug!(
        "Rx {} failed consistency check! ack {:02x} - {:02x}; id {:02x} - {:02x}; class {:02x}",
        waiting_for,
        frame.ack_no(),
        sequence_no,
        frame.message_id(),
        def.id.as_u8(),
        frame.header.status.raw() & 0xE0
    );
}
