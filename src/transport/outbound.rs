//! # Outbound Queues
//!
//! Non-blocking, order-preserving, coalesced sends.
//!
//! Producers call [`SendQueue::enqueue`] from any task. The first enqueue on
//! an idle queue flips its `sending` flag and the caller spawns [`drain`];
//! later enqueues only append. The drain task packs queued frames in FIFO
//! order into one buffer of at most `buffer_size` bytes, issues a single
//! write, and repeats until the queue is empty. At most one write per queue
//! is ever in flight.
//!
//! ```text
//! enqueue(800) enqueue(900)   buffer 1500   ->  write(800) write(900)
//! enqueue(800) enqueue(600)   buffer 1500   ->  write(1400)
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::Mutex;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

use crate::utils::buffer_pool::BufferPool;
use crate::utils::global_metrics;

/// Destination of coalesced writes
pub trait WireSink: Send + Sync + 'static {
    fn write(&self, buf: Bytes) -> impl Future<Output = io::Result<()>> + Send;
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<Bytes>,
    sending: bool,
}

/// FIFO of encoded frames plus the flag marking an active drain
#[derive(Debug, Default)]
pub struct SendQueue {
    state: Mutex<QueueState>,
}

/// Outcome of one batch taken from the queue
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Batch {
    pub packets: usize,
    pub discarded: usize,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `frame`; returns true when the caller must start a drain task
    pub fn enqueue(&self, frame: Bytes) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        state.frames.push_back(frame);
        if state.sending {
            false
        } else {
            state.sending = true;
            true
        }
    }

    /// Move queued frames into `buf` while they fit in `limit` bytes.
    ///
    /// Frames larger than `limit` on their own are discarded. An empty batch
    /// clears the `sending` flag under the same lock, so a concurrent
    /// enqueue either lands in this drain or starts the next one.
    pub fn take_batch(&self, buf: &mut BytesMut, limit: usize) -> Batch {
        let mut batch = Batch::default();
        let Ok(mut state) = self.state.lock() else {
            return batch;
        };

        while let Some(frame) = state.frames.front() {
            if frame.len() > limit {
                warn!(
                    len = frame.len(),
                    limit, "Discarding frame larger than the send buffer"
                );
                state.frames.pop_front();
                batch.discarded += 1;
                continue;
            }
            if buf.len() + frame.len() > limit {
                break;
            }
            if let Some(frame) = state.frames.pop_front() {
                buf.extend_from_slice(&frame);
                batch.packets += 1;
            }
        }

        if batch.packets == 0 {
            state.sending = false;
        }
        batch
    }

    /// Drop everything queued and mark the queue idle
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.frames.clear();
            state.sending = false;
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.frames.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sending(&self) -> bool {
        self.state.lock().map(|s| s.sending).unwrap_or(false)
    }
}

/// Write queued frames to `sink` until the queue is empty.
///
/// On a write error the queue is cleared and the error returned; the caller
/// decides whether the transport survives.
pub async fn drain<S: WireSink>(
    queue: &SendQueue,
    sink: &S,
    pool: &BufferPool,
    buffer_size: usize,
) -> io::Result<()> {
    loop {
        let mut buffer = pool.acquire();
        let batch = queue.take_batch(&mut buffer, buffer_size);
        if batch.packets == 0 {
            return Ok(());
        }

        let len = buffer.len();
        // copy out so the pooled allocation keeps its full capacity
        let out = Bytes::copy_from_slice(&buffer[..]);
        buffer.clear();

        if let Err(e) = sink.write(out).await {
            queue.clear();
            return Err(e);
        }
        trace!(packets = batch.packets, bytes = len, "Coalesced write");
        global_metrics().write_completed(batch.packets as u64, len as u64);
    }
}

/// TCP side of a connection
pub struct StreamSink<W> {
    writer: tokio::sync::Mutex<W>,
}

impl<W> StreamSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    pub async fn shutdown(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }
}

impl<W> WireSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write(&self, buf: Bytes) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(&buf).await?;
        writer.flush().await
    }
}

impl<W> std::fmt::Debug for StreamSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSink").finish_non_exhaustive()
    }
}
