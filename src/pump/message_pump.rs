//! Message Pump
//!
//! Background thread moving bytes between the transport and the queues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::protocol::hex_dump;
use crate::transport::{self, Transport};
use super::{FrameAssembler, InboundFrame};

/// Owns the transport (through its worker thread) and both queues
///
/// ## Concurrency:
/// - `outbound_tx` / `inbound_rx`: crossbeam channels, the only state
///   shared with the worker
/// - `shutdown`, `running`: atomics
/// - `worker`: join handle behind a Mutex so `stop()` works through `&self`
///
/// When the worker exits it drops the inbound sender, so any caller blocked
/// in `dequeue_inbound_timeout` sees `Disconnected` right away.
pub struct MessagePump {
    outbound_tx: Sender<Vec<u8>>,
    inbound_rx: Receiver<InboundFrame>,
    shutdown: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    endpoint: String,
}

impl MessagePump {
    /// Open the configured transport and start pumping
    pub fn start(config: &Config) -> Result<Self> {
        config.validate()?;
        let transport = transport::open(config)?;
        Self::with_transport(transport, config)
    }

    /// Start pumping over a transport the caller already opened
    pub fn with_transport(transport: Box<dyn Transport>, config: &Config) -> Result<Self> {
        config.validate()?;

        let (outbound_tx, outbound_rx) = channel::unbounded();
        let (inbound_tx, inbound_rx) = channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let endpoint = transport.describe();

        let worker = PumpWorker {
            transport,
            assembler: FrameAssembler::new(config.max_payload_len),
            read_buf: vec![0u8; config.read_chunk_size],
            outbound_rx,
            inbound_tx,
            shutdown: Arc::clone(&shutdown),
            running: Arc::clone(&running),
            endpoint: endpoint.clone(),
        };

        let handle = thread::Builder::new()
            .name("boardlink-pump".to_string())
            .spawn(move || worker.run())
            .map_err(|e| LinkError::Start(format!("cannot spawn pump thread: {}", e)))?;

        Ok(Self {
            outbound_tx,
            inbound_rx,
            shutdown,
            running,
            worker: Mutex::new(Some(handle)),
            endpoint,
        })
    }

    /// Signal the worker to exit and join it
    ///
    /// Any partial frame in the accumulator is discarded. Safe to call more
    /// than once.
    ///
    /// The join waits for the worker's current transport read. Transports
    /// bound every read by the poll interval; a tty opened without `VTIME`
    /// does not, and then this blocks until the board sends a byte.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Message pump thread for {} panicked", self.endpoint);
            }
        }
    }

    /// Whether the worker is still moving bytes
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Queue bytes for the wire (never blocks)
    pub fn enqueue_outbound(&self, bytes: Vec<u8>) -> Result<()> {
        if !self.is_running() {
            return Err(LinkError::Disconnected);
        }
        self.outbound_tx
            .send(bytes)
            .map_err(|_| LinkError::Disconnected)
    }

    /// Take the oldest inbound frame, if any (never blocks)
    pub fn try_dequeue_inbound(&self) -> Option<InboundFrame> {
        self.inbound_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next inbound frame
    ///
    /// `Ok(None)` on timeout; `Err(Disconnected)` once the worker has exited
    /// and every queued frame has been taken.
    pub fn dequeue_inbound_timeout(&self, timeout: Duration) -> Result<Option<InboundFrame>> {
        match self.inbound_rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Disconnected),
        }
    }

    /// Frames received but not yet taken
    pub fn inbound_len(&self) -> usize {
        self.inbound_rx.len()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for MessagePump {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Worker
// =============================================================================

/// State owned by the pump thread
struct PumpWorker {
    transport: Box<dyn Transport>,
    assembler: FrameAssembler,
    read_buf: Vec<u8>,
    outbound_rx: Receiver<Vec<u8>>,
    inbound_tx: Sender<InboundFrame>,
    shutdown: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    endpoint: String,
}

impl PumpWorker {
    fn run(mut self) {
        tracing::info!("Message pump started on {}", self.endpoint);

        match self.pump_loop() {
            Ok(()) => tracing::info!("Message pump on {} stopped", self.endpoint),
            Err(e) => tracing::error!("Message pump on {} failed: {}", self.endpoint, e),
        }

        let discarded = self.assembler.clear();
        if discarded > 0 {
            tracing::warn!("Discarded {} bytes of partial frame on stop", discarded);
        }

        self.running.store(false, Ordering::Release);
        // `self.inbound_tx` drops here, disconnecting every waiting caller
    }

    fn pump_loop(&mut self) -> Result<()> {
        while !self.shutdown.load(Ordering::Acquire) {
            self.drain_outbound()?;

            let n = self
                .transport
                .read(&mut self.read_buf)
                .map_err(|e| LinkError::Transport(format!("read failed: {}", e)))?;
            if n == 0 {
                continue;
            }

            tracing::trace!("Rx bytes: {}", hex_dump(&self.read_buf[..n]));
            self.assembler.push(&self.read_buf[..n]);

            while let Some(inbound) = self.assembler.next_frame() {
                tracing::debug!("Rx frame: {}", hex_dump(&inbound.raw));
                if self.inbound_tx.send(inbound).is_err() {
                    // Pump handle is gone; nobody is listening
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn drain_outbound(&mut self) -> Result<()> {
        loop {
            match self.outbound_rx.try_recv() {
                Ok(bytes) => {
                    tracing::debug!("Tx frame: {}", hex_dump(&bytes));
                    self.transport
                        .write_all(&bytes)
                        .map_err(|e| LinkError::Transport(format!("write failed: {}", e)))?;
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    self.shutdown.store(true, Ordering::Release);
                    return Ok(());
                }
            }
        }
    }
}
