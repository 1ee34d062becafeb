//! Simulated Transport
//!
//! A `Transport` wired straight into a `SimulatedBoard`.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::transport::Transport;
use super::board::{Faults, SimulatedBoard};

/// Test-side control over a running simulated board
#[derive(Clone)]
pub struct BoardHandle {
    board: Arc<Mutex<SimulatedBoard>>,
    to_host: Sender<Vec<u8>>,
    link_up: Arc<AtomicBool>,
}

impl BoardHandle {
    pub fn set_faults(&self, faults: Faults) {
        self.board.lock().faults = faults;
    }

    /// Run `f` against the board while holding its lock
    pub fn with_board<R>(&self, f: impl FnOnce(&mut SimulatedBoard) -> R) -> R {
        f(&mut self.board.lock())
    }

    /// Push raw bytes towards the host, as if the board sent them
    pub fn inject(&self, bytes: &[u8]) {
        // The transport holds the receiver for as long as it exists
        let _ = self.to_host.send(bytes.to_vec());
    }

    /// Break the link: every further read or write fails
    pub fn disconnect(&self) {
        self.link_up.store(false, Ordering::Release);
    }

    pub fn requests_received(&self) -> u64 {
        self.board.lock().requests_received()
    }
}

/// Host-side end of the simulated UART
pub struct SimulatedTransport {
    handle: BoardHandle,
    from_board: Receiver<Vec<u8>>,
    pending: BytesMut,
    read_timeout: Duration,
    chunk_size: usize,
}

impl SimulatedTransport {
    /// Wire a transport to `board`; reads wait at most `read_timeout`
    pub fn new(board: SimulatedBoard, read_timeout: Duration) -> (Self, BoardHandle) {
        let (to_host, from_board) = channel::unbounded();
        let handle = BoardHandle {
            board: Arc::new(Mutex::new(board)),
            to_host,
            link_up: Arc::new(AtomicBool::new(true)),
        };

        let transport = Self {
            handle: handle.clone(),
            from_board,
            pending: BytesMut::new(),
            read_timeout,
            chunk_size: usize::MAX,
        };
        (transport, handle)
    }

    /// Deliver board output at most `size` bytes per read
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    fn check_link(&self) -> io::Result<()> {
        if self.handle.link_up.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated link down"))
        }
    }
}

impl Transport for SimulatedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_link()?;

        if self.pending.is_empty() {
            match self.from_board.recv_timeout(self.read_timeout) {
                Ok(bytes) => self.pending.extend_from_slice(&bytes),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let n = self.pending.len().min(buf.len()).min(self.chunk_size);
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.check_link()?;

        let reply = self.handle.board.lock().feed(bytes);
        if !reply.is_empty() {
            self.handle.inject(&reply);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "simulated-board".to_string()
    }
}
