use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::codec::decode_frame;
use crate::error::{FrameError, Result};
use crate::protocol::ProtocolConfig;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Splits the incoming byte stream into frames and delivers each frame to the
/// oldest outstanding reader.
///
/// Owns the receive buffer and the pending read queue. Callers sharing a
/// framer between the link pump and the executor put it behind one mutex and
/// never hold the lock across an await.
#[derive(Debug)]
pub struct Framer {
    buf: BytesMut,
    pending: VecDeque<oneshot::Sender<Option<String>>>,
    terminator: u8,
    max_buffer_size: usize,
}

impl Framer {
    /// Create a framer for the given protocol.
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            pending: VecDeque::new(),
            terminator: config.terminator_byte(),
            max_buffer_size: config.max_buffer_size,
        }
    }

    /// Append bytes from the link and extract at most one frame.
    ///
    /// If the buffer exceeds its limit without a terminator it is discarded
    /// and `BufferOverflow` is returned; pending reads are left alone.
    pub fn on_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        self.extract();

        if self.buf.len() > self.max_buffer_size {
            let size = self.buf.len();
            warn!(size, max = self.max_buffer_size, "receive buffer overflow, discarding");
            self.buf.clear();
            return Err(FrameError::BufferOverflow {
                size,
                max: self.max_buffer_size,
            });
        }
        Ok(())
    }

    /// Register a reader at the tail of the queue.
    ///
    /// Data buffered before anyone was listening is scanned again so it
    /// cannot sit there forever.
    pub fn schedule_read(&mut self) -> PendingRead {
        let (tx, rx) = oneshot::channel();
        self.pending.push_back(tx);
        if !self.buf.is_empty() {
            self.extract();
        }
        PendingRead { rx }
    }

    /// Clear the receive buffer and cancel every pending read.
    ///
    /// Returns the number of reads cancelled.
    pub fn drain(&mut self) -> usize {
        self.buf.clear();
        let cancelled = self.pending.len();
        for reader in self.pending.drain(..) {
            let _ = reader.send(None);
        }
        debug!(cancelled, "receive state drained");
        cancelled
    }

    /// Number of reads waiting for a frame.
    pub fn pending_reads(&self) -> usize {
        self.pending.len()
    }

    /// Bytes received but not yet framed.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    fn extract(&mut self) {
        let Some(frame) = decode_frame(&mut self.buf, self.terminator) else {
            return;
        };
        debug!(
            frame = ?frame,
            remaining = self.buf.len(),
            "extracted frame"
        );
        match self.pending.pop_front() {
            Some(reader) => {
                if reader.send(Some(frame)).is_err() {
                    debug!("reader gone before its frame arrived");
                }
            }
            None => debug!("no pending reader, frame dropped"),
        }
    }
}

/// An outstanding read.
///
/// Resolves to the next frame, or `None` once cancelled by [`Framer::drain`]
/// or if the framer is dropped.
#[derive(Debug)]
#[must_use = "a pending read does nothing unless awaited"]
pub struct PendingRead {
    rx: oneshot::Receiver<Option<String>>,
}

impl Future for PendingRead {
    type Output = Option<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.ok().flatten())
    }
}
