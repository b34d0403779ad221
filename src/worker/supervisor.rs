//! Worker process lifecycle: start, respawn, broadcast, shutdown.

use std::collections::HashSet;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use slirc_wire::LineCodec;
use slirc_wire::frame::MAX_FRAME_LEN;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{PipeChannel, Spawner, WorkerPool};
use crate::error::{SpawnError, SupervisorError};

/// Delay before retrying after a failed spawn.
const RESPAWN_RETRY: Duration = Duration::from_secs(1);

/// Lifecycle notifications from per-worker tasks.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// One frame written by a worker.
    Frame { pid: u32, frame: String },
    WorkerExited { pid: u32, status: Option<ExitStatus> },
    /// A worker's input pipe broke with these frames still undelivered.
    Undelivered { pid: u32, frames: Vec<String> },
    /// The retry timer after a failed spawn fired.
    RespawnDue,
}

pub struct Supervisor<S> {
    spawner: S,
    pool: Arc<WorkerPool<PipeChannel>>,
    channel_capacity: usize,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    respawn_pending: bool,
}

impl<S: Spawner> Supervisor<S> {
    pub fn new(spawner: S, workers: usize, channel_capacity: usize) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            spawner,
            pool: Arc::new(WorkerPool::new(workers)),
            channel_capacity,
            events_tx,
            events_rx,
            respawn_pending: false,
        }
    }

    pub fn pool(&self) -> Arc<WorkerPool<PipeChannel>> {
        Arc::clone(&self.pool)
    }

    /// Bring the pool up to its target.
    ///
    /// Fails only if not a single worker could be started; a partial start
    /// schedules a retry for the rest.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        let target = self.pool.lock().target();
        for _ in 0..target {
            if let Err(e) = self.spawn_one() {
                if self.pool.live_count() == 0 {
                    return Err(SupervisorError::Bootstrap(e));
                }
                error!(error = %e, "Worker spawn failed, retrying later");
                self.schedule_respawn();
                break;
            }
        }
        info!(workers = self.pool.live_count(), target, "Worker pool started");
        Ok(())
    }

    /// Next frame from any worker. Lifecycle events are handled on the way.
    pub async fn next_frame(&mut self) -> Option<(u32, String)> {
        loop {
            match self.events_rx.recv().await? {
                SupervisorEvent::Frame { pid, frame } => return Some((pid, frame)),
                SupervisorEvent::WorkerExited { pid, status } => self.on_exit(pid, status),
                SupervisorEvent::Undelivered { pid, frames } => self.resubmit(pid, frames),
                SupervisorEvent::RespawnDue => {
                    self.respawn_pending = false;
                    self.top_up();
                }
            }
        }
    }

    /// Send `signal` to every live worker. Returns how many were signalled.
    pub fn broadcast(&self, signal: Signal) -> usize {
        let mut sent = 0;
        for pid in self.pool.live_pids() {
            match send_signal(pid, signal) {
                Ok(()) => sent += 1,
                Err(e) => warn!(pid, error = %e, error_code = e.error_code(), "Signal failed"),
            }
        }
        sent
    }

    /// Stop all workers: close their channels, SIGINT them and wait up to
    /// `grace` for them to exit. Stragglers are killed.
    pub async fn shutdown(mut self, grace: Duration) -> Result<(), SupervisorError> {
        let pids = self.pool.lock().drain();
        let mut remaining: HashSet<u32> = pids.iter().copied().collect();
        for &pid in &pids {
            if let Err(e) = send_signal(pid, Signal::SIGINT) {
                debug!(pid, error = %e, "Interrupt failed");
            }
        }
        info!(workers = pids.len(), "Waiting for workers to exit");

        let wait = async {
            while !remaining.is_empty() {
                match self.events_rx.recv().await {
                    Some(SupervisorEvent::WorkerExited { pid, .. }) => {
                        remaining.remove(&pid);
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        };
        if tokio::time::timeout(grace, wait).await.is_ok() {
            info!("All workers exited");
            return Ok(());
        }

        let mut stragglers: Vec<u32> = remaining.into_iter().collect();
        stragglers.sort_unstable();
        error!(pids = ?stragglers, "Workers ignored shutdown, killing");
        for &pid in &stragglers {
            if let Err(e) = send_signal(pid, Signal::SIGKILL) {
                warn!(pid, error = %e, "Kill failed");
            }
        }
        Err(SupervisorError::Stragglers(stragglers))
    }

    fn on_exit(&mut self, pid: u32, status: Option<ExitStatus>) {
        if !self.pool.lock().mark_dead(pid) {
            debug!(pid, "Exit of untracked worker");
            return;
        }
        warn!(pid, status = ?status, "Worker exited");
        self.top_up();
    }

    /// Hand frames stranded on a broken worker pipe to the rest of the pool.
    fn resubmit(&self, pid: u32, frames: Vec<String>) {
        let mut group = self.pool.lock();
        let mut lost = 0;
        for frame in &frames {
            if let Err(e) = group.submit(frame) {
                debug!(pid, error = %e, "Stranded frame dropped");
                lost += 1;
            }
        }
        if lost > 0 {
            warn!(pid, lost, "Stranded frames could not be redelivered");
        }
        info!(pid, redelivered = frames.len() - lost, "Frames from broken worker pipe redelivered");
    }

    fn top_up(&mut self) {
        while self.pool.lock().deficit() > 0 {
            if let Err(e) = self.spawn_one() {
                error!(error = %e, "Worker respawn failed");
                self.schedule_respawn();
                return;
            }
        }
    }

    fn schedule_respawn(&mut self) {
        if self.respawn_pending {
            return;
        }
        self.respawn_pending = true;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RESPAWN_RETRY).await;
            let _ = tx.send(SupervisorEvent::RespawnDue);
        });
    }

    fn spawn_one(&mut self) -> Result<u32, SpawnError> {
        let worker = self.spawner.spawn()?;
        let pid = worker.pid;

        // A worker that stops reading its input is killed and replaced.
        let retire = CancellationToken::new();
        let tx = self.events_tx.clone();
        let broken = retire.clone();
        let channel = PipeChannel::spawn(pid, worker.stdin, self.channel_capacity, move |frames| {
            broken.cancel();
            let _ = tx.send(SupervisorEvent::Undelivered { pid, frames });
        });
        let slot = self.pool.lock().insert(pid, channel);

        let tx = self.events_tx.clone();
        let stdout = worker.stdout;
        tokio::spawn(async move {
            let mut frames = FramedRead::new(stdout, LineCodec::with_max_len(MAX_FRAME_LEN));
            while let Some(item) = frames.next().await {
                match item {
                    Ok(Ok(frame)) => {
                        if tx.send(SupervisorEvent::Frame { pid, frame }).is_err() {
                            return;
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(pid, error = %e, code = e.error_code(), "Skipping unreadable worker frame");
                    }
                    Err(e) => {
                        warn!(pid, error = %e, "Worker output unreadable");
                        return;
                    }
                }
            }
        });

        let tx = self.events_tx.clone();
        let mut child = worker.child;
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => status,
                () = retire.cancelled() => {
                    warn!(pid, "Worker stopped reading its input, killing");
                    if let Err(e) = child.start_kill() {
                        debug!(pid, error = %e, "Kill failed");
                    }
                    child.wait().await
                }
            };
            let status = match exited {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!(pid, error = %e, "Failed to wait on worker");
                    None
                }
            };
            let _ = tx.send(SupervisorEvent::WorkerExited { pid, status });
        });

        info!(pid, slot, "Worker started");
        Ok(pid)
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), SupervisorError> {
    let raw = i32::try_from(pid).map_err(|_| SupervisorError::Signal {
        pid,
        source: nix::Error::EINVAL,
    })?;
    signal::kill(Pid::from_raw(raw), signal).map_err(|source| SupervisorError::Signal { pid, source })
}
