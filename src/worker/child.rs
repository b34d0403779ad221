//! The worker side of the IPC channel.
//!
//! A worker reads `S<id> <line>` frames on stdin, hands them to its handler
//! and writes whatever the handler queued to stdout. SIGHUP rebuilds the
//! handler; SIGINT, SIGTERM or end of input stop the loop.

use std::io;

use futures_util::{SinkExt, StreamExt};
use slirc_wire::LineCodec;
use slirc_wire::frame::MAX_FRAME_LEN;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::{CoreHandler, EventHandler, FrameDispatcher};

/// Out-of-band instructions for a running worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Reload,
    Shutdown,
}

/// Worker process entry point: stdio frames, unix signals, core handler.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let control = forward_signals()?;
    let handler = CoreHandler::new(config.identity.nick.clone());
    info!(pid = std::process::id(), "Worker ready");
    run(tokio::io::stdin(), tokio::io::stdout(), control, handler).await?;
    info!(pid = std::process::id(), "Worker exiting");
    Ok(())
}

/// Translate SIGHUP into [`Control::Reload`] and SIGINT/SIGTERM into
/// [`Control::Shutdown`].
pub fn forward_signals() -> io::Result<mpsc::Receiver<Control>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = mpsc::channel(4);

    tokio::spawn(async move {
        loop {
            let control = tokio::select! {
                Some(()) = hangup.recv() => Control::Reload,
                Some(()) = interrupt.recv() => Control::Shutdown,
                Some(()) = terminate.recv() => Control::Shutdown,
                else => return,
            };
            if tx.send(control).await.is_err() {
                return;
            }
        }
    });
    Ok(rx)
}

/// Frame loop. Returns on shutdown or end of input; a frame that is too
/// long or not UTF-8 is skipped.
pub async fn run<R, W, H>(
    input: R,
    output: W,
    mut control: mpsc::Receiver<Control>,
    handler: H,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: EventHandler,
{
    let mut dispatcher = FrameDispatcher::new(handler);
    let mut frames = FramedRead::new(input, LineCodec::with_max_len(MAX_FRAME_LEN));
    let mut sink = FramedWrite::new(output, LineCodec::with_max_len(MAX_FRAME_LEN));

    send_all(&mut sink, dispatcher.init()).await?;

    loop {
        tokio::select! {
            biased;

            control = control.recv() => match control {
                Some(Control::Reload) => {
                    info!("Reinitialising handlers");
                    send_all(&mut sink, dispatcher.reinitialize()).await?;
                }
                Some(Control::Shutdown) | None => {
                    info!("Shutdown requested");
                    break;
                }
            },

            frame = frames.next() => match frame {
                Some(Ok(Ok(frame))) => match dispatcher.dispatch_frame(&frame) {
                    Ok(out) => send_all(&mut sink, out).await?,
                    Err(e) => warn!(error = %e, frame = %frame, "Dropping bad frame"),
                },
                Some(Ok(Err(e))) => warn!(error = %e, code = e.error_code(), "Skipping unreadable frame"),
                Some(Err(e)) => return Err(e),
                None => {
                    debug!("Parent closed the channel");
                    break;
                }
            },
        }
    }

    sink.flush().await
}

async fn send_all<W>(
    sink: &mut FramedWrite<W, LineCodec>,
    frames: Vec<String>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if frames.is_empty() {
        return Ok(());
    }
    for frame in frames {
        sink.feed(frame).await?;
    }
    sink.flush().await
}
