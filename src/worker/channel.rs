//! Pipe-backed worker channel.

use futures_util::SinkExt;
use parking_lot::Mutex;
use slirc_wire::LineCodec;
use slirc_wire::frame::MAX_FRAME_LEN;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::codec::FramedWrite;
use tracing::{debug, warn};

use super::WorkerChannel;
use crate::error::ChannelError;

/// Bounded queue in front of a worker's stdin.
///
/// A writer task drains the queue; `send` never blocks, so a stuck worker
/// shows up as [`ChannelError::Full`] and the pool moves on.
///
/// If the pipe breaks, the queue is closed at once and the frame that
/// failed, plus everything still queued behind it, goes to `on_broken`.
/// Bytes the pipe had already accepted are gone with the worker.
pub struct PipeChannel {
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl PipeChannel {
    /// Start the writer task for `writer`. Must be called inside a runtime.
    pub fn spawn<W, F>(pid: u32, writer: W, capacity: usize, on_broken: F) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        F: FnOnce(Vec<String>) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));
        tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, LineCodec::with_max_len(MAX_FRAME_LEN));
            while let Some(frame) = rx.recv().await {
                if let Err(e) = sink.send(frame.clone()).await {
                    rx.close();
                    let mut unsent = vec![frame];
                    while let Ok(frame) = rx.try_recv() {
                        unsent.push(frame);
                    }
                    warn!(pid, error = %e, unsent = unsent.len(), "Worker pipe write failed");
                    on_broken(unsent);
                    return;
                }
            }
            if let Err(e) = sink.close().await {
                debug!(pid, error = %e, "Worker pipe close failed");
            }
        });
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }
}

impl WorkerChannel for PipeChannel {
    fn send(&self, frame: &str) -> Result<(), ChannelError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(ChannelError::Closed)?;
        tx.try_send(frame.to_owned()).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    fn close(&self) {
        self.tx.lock().take();
    }
}
