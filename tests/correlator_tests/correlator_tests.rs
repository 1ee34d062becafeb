//! Tests for the Request/Response Correlator
//!
//! These tests verify:
//! - Sequence numbering (1..=255, never 0)
//! - Ack and response matching on ack number, message id and class
//! - One deadline across ack + response
//! - Requests are validated against the catalog before any I/O
//! - Only one request may be outstanding

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use boardlink::catalog::MessageId;
use boardlink::correlator::Correlator;
use boardlink::protocol::{build_frame, MessageClass, StatusByte};
use boardlink::pump::MessagePump;
use boardlink::sim::{BoardHandle, Faults, SimulatedBoard, SimulatedTransport};
use boardlink::{Config, LinkError};

// =============================================================================
// Helper Functions
// =============================================================================

const POLL_MS: u64 = 20;

fn setup(faults: Faults) -> (Correlator, Arc<MessagePump>, BoardHandle) {
    let config = Config::builder()
        .device("simulated")
        .poll_interval_ms(POLL_MS)
        .build();
    let board = SimulatedBoard::default().with_faults(faults);
    let (transport, handle) = SimulatedTransport::new(board, config.poll_interval());
    let pump = Arc::new(MessagePump::with_transport(Box::new(transport), &config).unwrap());
    (Correlator::new(Arc::clone(&pump), &config), pump, handle)
}

fn timeout() -> Duration {
    Duration::from_millis(300)
}

fn board_frame(class: MessageClass, ack_no: u8, id: MessageId, payload: &[u8]) -> Vec<u8> {
    build_frame(0x80, ack_no, StatusByte::new(class, 0), id.as_u8(), payload).unwrap()
}

/// Block until the pump has queued `count` inbound frames
fn wait_for_inbound(pump: &MessagePump, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(1);
    while pump.inbound_len() < count {
        assert!(Instant::now() < deadline, "only {} frames queued", pump.inbound_len());
        thread::sleep(Duration::from_millis(5));
    }
}

// =============================================================================
// Sequence Number Tests
// =============================================================================

#[test]
fn test_sequence_numbers_start_at_one() {
    let (correlator, _pump, _board) = setup(Faults::default());
    assert_eq!(correlator.next_sequence_number(), 1);
    assert_eq!(correlator.next_sequence_number(), 2);
    assert_eq!(correlator.next_sequence_number(), 3);
}

#[test]
fn test_sequence_numbers_wrap_past_zero() {
    let (correlator, _pump, _board) = setup(Faults::default());
    let issued: Vec<u8> = (0..600).map(|_| correlator.next_sequence_number()).collect();

    assert!(issued.iter().all(|&seq| seq != 0));
    assert_eq!(issued[254], 255);
    assert_eq!(issued[255], 1);
    assert_eq!(issued[510], 1);
}

// =============================================================================
// Ack Tests
// =============================================================================

#[test]
fn test_ping_is_acked() {
    let (correlator, _pump, board) = setup(Faults::default());

    correlator
        .send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout())
        .unwrap();
    assert_eq!(board.requests_received(), 1);
    assert!(correlator.pending().is_none());
}

#[test]
fn test_silent_board_times_out_after_full_timeout() {
    let (correlator, _pump, _board) = setup(Faults {
        mute: true,
        ..Faults::default()
    });

    let started = Instant::now();
    let result = correlator.send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout());
    let elapsed = started.elapsed();

    let waited_ms = match result {
        Err(LinkError::TimedOut { msg_id: 0x00, waited_ms }) => waited_ms,
        other => panic!("expected a ping timeout, got {:?}", other),
    };
    assert!(waited_ms >= 300, "reported {} ms", waited_ms);
    assert!(waited_ms as u128 <= elapsed.as_millis());
    assert!(elapsed >= timeout(), "returned after {:?}", elapsed);
    assert!(elapsed < timeout() + Duration::from_millis(500), "returned after {:?}", elapsed);
    assert!(correlator.pending().is_none());
}

#[test]
fn test_wrong_ack_number_is_not_accepted() {
    let (correlator, _pump, _board) = setup(Faults {
        wrong_ack_no: true,
        ..Faults::default()
    });

    let result = correlator.send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout());
    assert!(matches!(result, Err(LinkError::TimedOut { .. })));
}

#[test]
fn test_corrupt_ack_is_not_accepted() {
    let (correlator, _pump, _board) = setup(Faults {
        corrupt_crc: true,
        ..Faults::default()
    });

    let result = correlator.send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout());
    assert!(matches!(result, Err(LinkError::TimedOut { .. })));
}

#[test]
fn test_recovers_after_faulty_exchange() {
    let (correlator, _pump, board) = setup(Faults {
        wrong_ack_no: true,
        ..Faults::default()
    });
    assert!(correlator
        .send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout())
        .is_err());

    board.set_faults(Faults::default());
    correlator
        .send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout())
        .unwrap();
}

// =============================================================================
// Stale Frame Tests
// =============================================================================

#[test]
fn test_stale_frames_dropped_before_request() {
    let (correlator, pump, board) = setup(Faults::default());

    // Late ack and response from an abandoned exchange
    board.inject(&board_frame(MessageClass::Ack, 200, MessageId::GetSoftwareVersion, &[]));
    board.inject(&board_frame(MessageClass::Response, 200, MessageId::GetSoftwareVersion, &[0x01; 11]));
    wait_for_inbound(&pump, 2);

    correlator
        .send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout())
        .unwrap();
    assert_eq!(pump.inbound_len(), 0);
}

#[test]
fn test_queued_ack_is_not_taken_for_the_next_request() {
    let (correlator, pump, board) = setup(Faults {
        mute: true,
        ..Faults::default()
    });

    // Matches the sequence number the next request will carry
    board.inject(&board_frame(MessageClass::Ack, 1, MessageId::Ping, &[]));
    wait_for_inbound(&pump, 1);

    let result = correlator.send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout());
    assert!(matches!(result, Err(LinkError::TimedOut { .. })));
    assert_eq!(pump.inbound_len(), 0);
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_version_response_returned() {
    let (correlator, _pump, _board) = setup(Faults::default());

    let frame = correlator
        .send_command_and_wait_for_response(MessageId::GetSoftwareVersion.as_u8(), 11, timeout())
        .unwrap();
    assert_eq!(frame.message_id(), 0x01);
    assert_eq!(frame.payload.len(), 11);
    assert_eq!(frame.encoded_len(), 19);
    assert_eq!(frame.ack_no(), 1);
}

#[test]
fn test_short_response_rejected() {
    let (correlator, _pump, _board) = setup(Faults {
        truncate_responses: true,
        ..Faults::default()
    });

    let result =
        correlator.send_command_and_wait_for_response(MessageId::GetSoftwareVersion.as_u8(), 11, timeout());
    assert!(matches!(result, Err(LinkError::TimedOut { msg_id: 0x01, .. })));
}

#[test]
fn test_missing_response_times_out_on_shared_deadline() {
    let (correlator, _pump, _board) = setup(Faults {
        drop_responses: true,
        ..Faults::default()
    });

    let started = Instant::now();
    let result = correlator.send_command_and_wait_for_response(MessageId::GetKey.as_u8(), 33, timeout());
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(LinkError::TimedOut { .. })));
    assert!(elapsed < timeout() + Duration::from_millis(500), "returned after {:?}", elapsed);
}

#[test]
fn test_new_class_response_accepted() {
    let (correlator, _pump, _board) = setup(Faults {
        legacy_response_class: true,
        ..Faults::default()
    });

    let frame = correlator
        .send_command_and_wait_for_response(MessageId::GetBitInfo.as_u8(), 10, timeout())
        .unwrap();
    assert_eq!(frame.payload.len(), 10);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_unknown_command_rejected_before_io() {
    let (correlator, _pump, board) = setup(Faults::default());

    let result = correlator.send_and_wait_for_ack(0x42, &[], timeout());
    assert!(matches!(result, Err(LinkError::InvalidCommand(0x42))));
    assert_eq!(board.requests_received(), 0);
}

#[test]
fn test_wrong_response_length_rejected_before_io() {
    let (correlator, _pump, board) = setup(Faults::default());

    let result =
        correlator.send_command_and_wait_for_response(MessageId::GetSoftwareVersion.as_u8(), 10, timeout());
    assert!(matches!(result, Err(LinkError::InvalidCommand(0x01))));

    // Ping has no response to wait for
    let result = correlator.send_command_and_wait_for_response(MessageId::Ping.as_u8(), 0, timeout());
    assert!(matches!(result, Err(LinkError::InvalidCommand(0x00))));
    assert_eq!(board.requests_received(), 0);
}

#[test]
fn test_wrong_request_payload_rejected_before_io() {
    let (correlator, _pump, board) = setup(Faults::default());

    let result = correlator.send_and_wait_for_ack(MessageId::SetKey.as_u8(), &[0x01; 10], timeout());
    assert!(matches!(result, Err(LinkError::InvalidPayload(_))));
    assert_eq!(board.requests_received(), 0);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_second_request_while_one_in_flight() {
    let (correlator, _pump, _board) = setup(Faults {
        mute: true,
        ..Faults::default()
    });
    let correlator = Arc::new(correlator);

    let first = {
        let correlator = Arc::clone(&correlator);
        thread::spawn(move || correlator.send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout()))
    };

    thread::sleep(Duration::from_millis(100));
    let pending = correlator.pending().expect("first request should be pending");
    assert_eq!(pending.sequence_no, 1);
    assert_eq!(pending.message_id, MessageId::Ping.as_u8());

    let second = correlator.send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout());
    assert!(matches!(second, Err(LinkError::RequestInFlight { sequence_no: 1 })));

    assert!(matches!(first.join().unwrap(), Err(LinkError::TimedOut { .. })));
    assert!(correlator.pending().is_none());
}

#[test]
fn test_stop_interrupts_wait() {
    let (correlator, pump, _board) = setup(Faults {
        mute: true,
        ..Faults::default()
    });

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        pump.stop();
    });

    let started = Instant::now();
    let result = correlator.send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], Duration::from_secs(10));
    let elapsed = started.elapsed();
    stopper.join().unwrap();

    assert!(matches!(result, Err(LinkError::Disconnected)));
    assert!(elapsed < Duration::from_secs(1), "returned after {:?}", elapsed);
}

#[test]
fn test_request_after_stop_is_disconnected() {
    let (correlator, pump, board) = setup(Faults::default());
    pump.stop();

    let result = correlator.send_and_wait_for_ack(MessageId::Ping.as_u8(), &[], timeout());
    assert!(matches!(result, Err(LinkError::Disconnected)));
    assert_eq!(board.requests_received(), 0);
}
