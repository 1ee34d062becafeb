//! Tests for BoardLink
//!
//! These tests verify:
//! - Each catalog command end to end against the simulated board
//! - Key and unit info round trips
//! - Faulty responses are rejected rather than misparsed
//! - Stop from another thread ends a wait in progress

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use boardlink::catalog::{KeyToken, MessageId};
use boardlink::sim::{BoardHandle, Faults, SimulatedBoard, SimulatedTransport};
use boardlink::{BoardLink, Config, LinkError};

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config() -> Config {
    Config::builder()
        .device("simulated")
        .poll_interval_ms(20)
        .response_timeout_ms(300)
        .build()
}

fn setup_link() -> (BoardLink, BoardHandle) {
    setup_link_chunked(usize::MAX)
}

fn setup_link_chunked(chunk_size: usize) -> (BoardLink, BoardHandle) {
    let config = test_config();
    let (transport, board) = SimulatedTransport::new(SimulatedBoard::default(), config.poll_interval());
    let link = BoardLink::with_transport(Box::new(transport.with_chunk_size(chunk_size)), config).unwrap();
    (link, board)
}

fn key(text: &str) -> KeyToken {
    text.parse().unwrap()
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_ping() {
    let (link, board) = setup_link();
    assert!(link.is_connected());
    link.send_ping().unwrap();
    assert_eq!(board.requests_received(), 1);
}

#[test]
fn test_set_key_then_get_key() {
    let (link, board) = setup_link();
    let stored = key("ABCDEFGHIJKLMNOPQRSTUVWXYZ012345");

    link.send_set_key(&stored).unwrap();
    assert_eq!(&board.with_board(|b| b.state.key), stored.as_bytes());

    let read_back = link.get_key().unwrap();
    assert_eq!(read_back, stored);
    assert_eq!(read_back.as_str(), Some("ABCDEFGHIJKLMNOPQRSTUVWXYZ012345"));
}

#[test]
fn test_get_key_on_fresh_board() {
    let (link, _board) = setup_link();
    let read_back = link.get_key().unwrap();
    assert_eq!(read_back.as_bytes(), &[0u8; 32]);
}

#[test]
fn test_get_key_returns_board_bytes_unchecked() {
    let (link, board) = setup_link();
    let mut raw = *b"ABCD EFGHIJKLMNOPQRSTUVWXYZ01234";
    raw[31] = 0xFF;
    board.with_board(|b| b.state.key = raw);

    assert_eq!(link.get_key().unwrap().as_bytes(), &raw);
}

#[test]
fn test_software_version() {
    let (link, _board) = setup_link();
    let version = link.get_software_version().unwrap();

    assert_eq!(version.payload_version, 1);
    assert_eq!((version.major, version.minor, version.patch), (1, 4, 2));
    assert_eq!(version.build, 1187);
}

#[test]
fn test_info_queries() {
    let (link, board) = setup_link();
    board.with_board(|b| {
        b.state.slot_no = 6;
        b.state.bit_info[0] = 0x5A;
    });

    let slot = link.get_slot_no().unwrap();
    assert_eq!(slot.body[0], 6);

    let hardware = link.get_hardware_info().unwrap();
    assert!(hardware.body.starts_with(b"BLK-BACKPLANE"));

    let bit = link.get_bit_info().unwrap();
    assert_eq!(bit.body[0], 0x5A);
}

#[test]
fn test_unit_info_round_trip() {
    let (link, _board) = setup_link();
    let mut info = [0u8; 64];
    for (i, byte) in info.iter_mut().enumerate() {
        *byte = i as u8;
    }

    link.set_unit_info(&info).unwrap();
    let read_back = link.get_unit_info().unwrap();

    // Slot number, then the stored block
    assert_eq!(read_back.body[0], 3);
    assert_eq!(&read_back.body[1..], &info[..]);
}

#[test]
fn test_get_command_returns_raw_frame() {
    let (link, _board) = setup_link();
    let frame = link.get_command(MessageId::GetSlotNo, 8).unwrap();
    assert_eq!(frame.payload.len(), 8);

    let result = link.get_command(MessageId::GetSlotNo, 9);
    assert!(matches!(result, Err(LinkError::InvalidCommand(0x07))));
}

#[test]
fn test_one_byte_reads() {
    let (link, _board) = setup_link_chunked(1);
    link.send_set_key(&key("0123456789ABCDEF0123456789ABCDEF")).unwrap();
    assert_eq!(link.get_key().unwrap().as_str(), Some("0123456789ABCDEF0123456789ABCDEF"));
}

// =============================================================================
// Fault Tests
// =============================================================================

#[test]
fn test_truncated_version_rejected() {
    let (link, board) = setup_link();
    board.set_faults(Faults {
        truncate_responses: true,
        ..Faults::default()
    });

    assert!(matches!(link.get_software_version(), Err(LinkError::TimedOut { .. })));
}

#[test]
fn test_corrupt_crc_rejected() {
    let (link, board) = setup_link();
    board.set_faults(Faults {
        corrupt_crc: true,
        ..Faults::default()
    });

    assert!(matches!(link.get_key(), Err(LinkError::TimedOut { .. })));
    assert!(link.is_connected());
}

#[test]
fn test_sequence_advances_across_commands() {
    let (link, _board) = setup_link();
    link.send_ping().unwrap();
    link.get_software_version().unwrap();
    assert_eq!(link.correlator().next_sequence_number(), 3);
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_stop_from_other_thread() {
    let config = Config::builder()
        .device("simulated")
        .poll_interval_ms(20)
        .response_timeout_ms(10_000)
        .build();
    let board = SimulatedBoard::default().with_faults(Faults {
        mute: true,
        ..Faults::default()
    });
    let (transport, _board) = SimulatedTransport::new(board, config.poll_interval());
    let link = Arc::new(BoardLink::with_transport(Box::new(transport), config).unwrap());

    let stopper = {
        let link = Arc::clone(&link);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            link.stop();
        })
    };

    let started = Instant::now();
    let result = link.send_ping();
    let elapsed = started.elapsed();
    stopper.join().unwrap();

    assert!(matches!(result, Err(LinkError::Disconnected)));
    assert!(elapsed < Duration::from_secs(1), "returned after {:?}", elapsed);
    assert!(!link.is_connected());
}

#[test]
fn test_commands_after_stop_fail() {
    let (link, _board) = setup_link();
    link.stop();
    assert!(matches!(link.send_ping(), Err(LinkError::Disconnected)));
    assert!(matches!(link.get_key(), Err(LinkError::Disconnected)));
}

#[test]
fn test_link_down_is_disconnected() {
    let (link, board) = setup_link();
    board.disconnect();

    let started = Instant::now();
    assert!(matches!(link.send_ping(), Err(LinkError::Disconnected)));
    assert!(started.elapsed() < Duration::from_millis(300));
}
